use std::{
    io::{Read, Write},
    net::TcpListener,
    sync::{Mutex, OnceLock},
    thread,
};

/// Global lock for environment variable modifications in tests.
/// All tests that modify environment variables (especially RED5_HOME) or spawn
/// launcher scripts should acquire this lock to avoid racing each other.
pub static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns a localhost port nothing is listening on right now.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// Serves every request on an ephemeral port with the given status code.
pub fn serve_http(status: u16) -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    spawn_responder(listener, status);
    port
}

/// Serves every request on `port` with the given status code.
pub fn serve_http_on(port: u16, status: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    spawn_responder(listener, status);
    Ok(())
}

fn spawn_responder(listener: TcpListener, status: u16) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 {status} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });
}
