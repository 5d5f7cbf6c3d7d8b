#[cfg(feature = "mimalloc")]
mod mimalloc {
    use mimalloc::MiMalloc;

    #[global_allocator]
    static GLOBAL: MiMalloc = MiMalloc;
}

/// Applies `TCP_NODELAY` unless `NO_NODELAY` is set.
pub fn apply_nodelay(stream: &tokio::net::TcpStream) {
    if dotenvy::var("NO_NODELAY").is_ok() {
        return;
    }
    if let Err(e) = stream.set_nodelay(true) {
        crate::logging::ServerLogger::tcp_nodelay_failed(&e);
    }
}
