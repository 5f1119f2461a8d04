use std::io;
#[cfg(feature = "tls")]
use std::sync::Arc;

use http::Uri;
use http::uri::{Authority, PathAndQuery, Scheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use super::{AgentConfig, AgentError};
use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::timeout::TimeoutReader;

pub(crate) type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The origin an agent is bound to.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    scheme: Scheme,
    authority: Authority,
    host: String,
    port: u16,
}

impl Target {
    pub(crate) fn from_uri(uri: &Uri) -> Result<Self, AgentError> {
        let scheme = uri.scheme().cloned().ok_or_else(|| AgentError::invalid_uri(format!("{uri} has no scheme")))?;
        let authority = uri.authority().cloned().ok_or_else(|| AgentError::invalid_uri(format!("{uri} has no host")))?;

        let default_port = default_port(&scheme)?;
        if scheme == Scheme::HTTPS && !cfg!(feature = "tls") {
            return Err(AgentError::TlsUnsupported);
        }

        let host = authority.host().trim_start_matches('[').trim_end_matches(']').to_owned();
        let port = authority.port_u16().unwrap_or(default_port);
        Ok(Self { scheme, authority, host, port })
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    /// Turns a request URI into an absolute URI on this origin.
    ///
    /// Origin-form URIs are completed with the agent's scheme and authority; absolute
    /// URIs must point at the same host and port.
    pub(crate) fn resolve(&self, uri: &Uri) -> Result<Uri, AgentError> {
        if let Some(authority) = uri.authority() {
            let port = match uri.scheme() {
                Some(scheme) => authority.port_u16().unwrap_or(default_port(scheme)?),
                None => authority.port_u16().unwrap_or(self.port),
            };
            let host = authority.host().trim_start_matches('[').trim_end_matches(']');
            if !host.eq_ignore_ascii_case(&self.host) || port != self.port {
                return Err(AgentError::invalid_uri(format!("{uri} is not on {}", self.authority)));
            }
        }

        let path_and_query = uri.path_and_query().cloned().unwrap_or_else(|| PathAndQuery::from_static("/"));
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(AgentError::invalid_uri)
    }
}

fn default_port(scheme: &Scheme) -> Result<u16, AgentError> {
    if *scheme == Scheme::HTTP {
        Ok(80)
    } else if *scheme == Scheme::HTTPS {
        Ok(443)
    } else {
        Err(AgentError::invalid_uri(format!("unsupported scheme {scheme}")))
    }
}

/// The client side halves of one connection.
pub(crate) struct ClientConnection {
    pub(crate) framed_read: FramedRead<TimeoutReader<BoxReader>, ResponseDecoder>,
    pub(crate) framed_write: FramedWrite<BoxWriter, RequestEncoder>,
}

impl ClientConnection {
    pub(crate) fn new(reader: BoxReader, writer: BoxWriter, config: &AgentConfig) -> Self {
        Self {
            framed_read: FramedRead::new(TimeoutReader::new(reader, config.get_read_timeout()), ResponseDecoder::new()),
            framed_write: FramedWrite::new(writer, RequestEncoder::new()),
        }
    }
}

pub(crate) async fn connect(target: &Target, config: &AgentConfig) -> Result<ClientConnection, AgentError> {
    let connecting = TcpStream::connect((target.host.as_str(), target.port));
    let stream = match config.get_connect_timeout() {
        Some(timeout) => tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_elapsed| AgentError::connect(io::Error::new(io::ErrorKind::TimedOut, format!("connect timed out after {timeout:?}"))))?,
        None => connecting.await,
    }
    .map_err(AgentError::connect)?;

    if let Err(e) = stream.set_nodelay(true) {
        debug!(cause = %e, "can't set TCP_NODELAY");
    }
    trace!(host = %target.host, port = target.port, tls = target.is_tls(), "connected");

    let (reader, writer) = if target.is_tls() { split_tls(stream, &target.host).await? } else { split_plain(stream) };
    Ok(ClientConnection::new(reader, writer, config))
}

fn split_plain(stream: TcpStream) -> (BoxReader, BoxWriter) {
    let (reader, writer) = stream.into_split();
    (Box::new(reader), Box::new(writer))
}

#[cfg(feature = "tls")]
async fn split_tls(stream: TcpStream, host: &str) -> Result<(BoxReader, BoxWriter), AgentError> {
    use tokio_rustls::TlsConnector;
    use tokio_rustls::rustls::pki_types::ServerName;
    use tokio_rustls::rustls::{ClientConfig, RootCertStore};

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();

    let server_name = ServerName::try_from(host.to_owned()).map_err(AgentError::invalid_uri)?;
    let tls_stream = TlsConnector::from(Arc::new(tls_config)).connect(server_name, stream).await.map_err(AgentError::connect)?;

    let (reader, writer) = tokio::io::split(tls_stream);
    Ok((Box::new(reader), Box::new(writer)))
}

#[cfg(not(feature = "tls"))]
async fn split_tls(_stream: TcpStream, _host: &str) -> Result<(BoxReader, BoxWriter), AgentError> {
    Err(AgentError::TlsUnsupported)
}
