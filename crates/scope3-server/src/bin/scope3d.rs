use std::io;

use scope3_server::config::DEFAULT_HTTP_ADDR;
use scope3_server::DashboardServer;

fn main() -> io::Result<()> {
    let mode = std::env::var("SCOPE3D_TRANSPORT").unwrap_or_else(|_| "stdio".to_string());
    let server = DashboardServer::from_env().map_err(|err| io::Error::other(err.to_string()))?;
    match mode.as_str() {
        "stdio" => server.serve_stdio(),
        "http" => {
            let addr = std::env::var("SCOPE3_HTTP_ADDR")
                .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
            server.serve_http(&addr)
        }
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "SCOPE3D_TRANSPORT must be stdio or http",
        )),
    }
}
