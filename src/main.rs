use std::sync::Arc;

use browserslist_mcp::{
    browsers::QueryFacade,
    browserslist_client::BrowserslistClient,
    build_app,
    config::Config,
    logging,
    mcp::{server::ProtocolServer, stdio::StdioServer},
    worker::{build_edge_app, EdgeWorker},
    AppState,
};
use clap::{Parser, ValueEnum};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// REST API on an axum router
    Http,
    /// Edge worker surface: REST plus stateless MCP at /mcp
    Edge,
    /// MCP over stdin/stdout
    Stdio,
}

/// Browserslist queries over REST and the Model Context Protocol.
#[derive(Parser, Debug)]
#[command(name = "browserslist-mcp", version, about, long_about = None)]
struct Args {
    /// Front end to serve
    #[arg(long, value_enum, default_value_t = Transport::Http)]
    transport: Transport,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init_logging();

    let config = Config::from_env()?;
    let facade = QueryFacade::new(Arc::new(BrowserslistClient::new()));
    let server = Arc::new(ProtocolServer::new(facade));

    if args.transport == Transport::Stdio {
        info!(version = env!("CARGO_PKG_VERSION"), "stdio server starting");
        StdioServer::from_process(server).run().await?;
        return Ok(());
    }

    let app = match args.transport {
        Transport::Edge => build_edge_app(Arc::new(EdgeWorker::new(
            server,
            config.transport_options(),
            config.handler_timeout,
        ))),
        _ => build_app(AppState::from_server(server)),
    };

    let bind_socket = config.bind_socket()?;
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        transport = ?args.transport,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn transport_defaults_to_http() {
        let args = Args::parse_from(["browserslist-mcp"]);
        assert_eq!(args.transport, Transport::Http);

        let args = Args::parse_from(["browserslist-mcp", "--transport", "stdio"]);
        assert_eq!(args.transport, Transport::Stdio);
    }
}
