use std::convert::Infallible;
use std::hint::black_box;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::codec::{Decoder, Encoder};
use wick_http::codec::body::ChunkedEncoder;
use wick_http::codec::{RequestDecoder, ResponseEncoder};
use wick_http::connection::HttpConnection;
use wick_http::handler::service_fn;
use wick_http::protocol::body::ReqBody;
use wick_http::protocol::{Message, PayloadItem, PayloadSize, ResponseHead};

/// Replays a fixed input and swallows everything written.
struct ReplayIo {
    input: Bytes,
}

impl AsyncRead for ReplayIo {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let n = buf.remaining().min(self.input.len());
        let chunk = self.input.split_to(n);
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

struct SinkIo;

impl AsyncWrite for SinkIo {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

async fn hello(_req: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(Response::new(Full::new(Bytes::from_static(b"Hello World!"))))
}

fn bench_request_decoder(c: &mut Criterion) {
    let simple = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let chunked = concat!(
        "POST /upload HTTP/1.1\r\n",
        "Host: localhost\r\n",
        "Transfer-Encoding: chunked\r\n",
        "\r\n",
        "10\r\n0123456789abcdef\r\n",
        "10\r\n0123456789abcdef\r\n",
        "0\r\n\r\n",
    );

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&simple[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });

    c.bench_function("decode_chunked_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(chunked);
            while let Some(message) = decoder.decode(&mut bytes).unwrap() {
                black_box(message);
            }
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let mut head = ResponseHead::new(());
            *head.status_mut() = StatusCode::OK;
            let message = Message::<_, Bytes>::Header((head, PayloadSize::Length(12)));
            encoder.encode(message, &mut bytes).unwrap();
            black_box(bytes);
        });
    });

    let chunk = Bytes::from(vec![b'x'; 4096]);
    c.bench_function("encode_chunked_payload", |b| {
        b.iter(|| {
            let mut encoder = ChunkedEncoder::new();
            let mut bytes = BytesMut::with_capacity(16 * 1024);
            for _ in 0..3 {
                encoder.encode(PayloadItem::Chunk(chunk.clone()), &mut bytes).unwrap();
            }
            encoder.encode(PayloadItem::<Bytes>::Eof, &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let requests = Bytes::from("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".repeat(8));
    let handler = Arc::new(service_fn(hello));
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

    c.bench_function("process_pipelined_requests", |b| {
        b.to_async(&runtime).iter(|| {
            let connection = HttpConnection::new(ReplayIo { input: requests.clone() }, SinkIo);
            let handler = Arc::clone(&handler);
            async move { black_box(connection.process(handler).await.unwrap()) }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_http_connection);
criterion_main!(benches);
