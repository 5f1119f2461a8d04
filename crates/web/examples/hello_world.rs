use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use wick_web::{HandlerResult, Router, Server, ServerRequest, handler_fn};

async fn hello_world(req: &mut ServerRequest) -> HandlerResult {
    req.respond("hello world")?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder().get("/", handler_fn(hello_world)).build();
    let server = Server::builder().router(router).build().expect("router is set");

    let listener = match TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received");
            ctrl_c.cancel();
        }
    });

    if let Err(e) = server.serve(listener, shutdown).await {
        error!(cause = %e, "server stopped");
    }
}
