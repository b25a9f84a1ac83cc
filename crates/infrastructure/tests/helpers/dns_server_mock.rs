#![allow(dead_code)]
use ferrous_forward_domain::ResolverSpec;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

/// What a [`MockDnsServer`] answers with.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Sent over TCP, and over UDP unless `udp_response` is set.
    pub response: Vec<u8>,
    pub udp_response: Option<Vec<u8>>,
    pub udp_delay: Duration,
    /// Record requests but never answer.
    pub silent: bool,
    /// Send responses exactly as configured instead of copying the request id.
    pub keep_txid: bool,
}

impl MockBehavior {
    pub fn answer(response: Vec<u8>) -> Self {
        Self {
            response,
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn with_udp_response(mut self, response: Vec<u8>) -> Self {
        self.udp_response = Some(response);
        self
    }

    pub fn with_udp_delay(mut self, delay: Duration) -> Self {
        self.udp_delay = delay;
        self
    }

    pub fn keeping_txid(mut self) -> Self {
        self.keep_txid = true;
        self
    }

    fn reply_to(&self, request: &[u8], over_tcp: bool) -> Vec<u8> {
        let mut response = match (&self.udp_response, over_tcp) {
            (Some(udp), false) => udp.clone(),
            _ => self.response.clone(),
        };
        if !self.keep_txid && request.len() >= 2 && response.len() >= 2 {
            response[..2].copy_from_slice(&request[..2]);
        }
        response
    }
}

#[derive(Default)]
struct Seen {
    udp: Mutex<Vec<Vec<u8>>>,
    tcp: Mutex<Vec<Vec<u8>>>,
}

/// Upstream DNS server listening on UDP and TCP on the same loopback port.
pub struct MockDnsServer {
    addr: SocketAddr,
    seen: Arc<Seen>,
    shutdown: CancellationToken,
}

impl MockDnsServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        for _ in 0..25 {
            let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = tcp.local_addr().unwrap();
            if let Ok(udp) = UdpSocket::bind(addr).await {
                return Self::spawn(addr, udp, tcp, behavior);
            }
        }
        panic!("failed to listen on the same port for TCP and UDP after 25 tries");
    }

    fn spawn(addr: SocketAddr, udp: UdpSocket, tcp: TcpListener, behavior: MockBehavior) -> Self {
        let seen = Arc::new(Seen::default());
        let shutdown = CancellationToken::new();
        let behavior = Arc::new(behavior);

        tokio::spawn(serve_udp(
            Arc::new(udp),
            Arc::clone(&behavior),
            Arc::clone(&seen),
            shutdown.clone(),
        ));
        tokio::spawn(serve_tcp(tcp, behavior, Arc::clone(&seen), shutdown.clone()));

        Self {
            addr,
            seen,
            shutdown,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn resolver(&self) -> ResolverSpec {
        ResolverSpec::plain(self.addr)
    }

    pub fn udp_requests(&self) -> Vec<Vec<u8>> {
        self.seen.udp.lock().unwrap().clone()
    }

    pub fn tcp_requests(&self) -> Vec<Vec<u8>> {
        self.seen.tcp.lock().unwrap().clone()
    }

    pub fn udp_hits(&self) -> usize {
        self.seen.udp.lock().unwrap().len()
    }

    pub fn tcp_hits(&self) -> usize {
        self.seen.tcp.lock().unwrap().len()
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn serve_udp(
    socket: Arc<UdpSocket>,
    behavior: Arc<MockBehavior>,
    seen: Arc<Seen>,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; 65535];
    loop {
        let (len, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok(received) => received,
                Err(_) => continue,
            },
        };

        let request = buf[..len].to_vec();
        seen.udp.lock().unwrap().push(request.clone());
        if behavior.silent {
            continue;
        }

        let socket = Arc::clone(&socket);
        let behavior = Arc::clone(&behavior);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(behavior.udp_delay) => {
                    let response = behavior.reply_to(&request, false);
                    let _ = socket.send_to(&response, peer).await;
                }
            }
        });
    }
}

async fn serve_tcp(
    listener: TcpListener,
    behavior: Arc<MockBehavior>,
    seen: Arc<Seen>,
    shutdown: CancellationToken,
) {
    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, _)) => stream,
                Err(_) => continue,
            },
        };

        let behavior = Arc::clone(&behavior);
        let seen = Arc::clone(&seen);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = serve_tcp_conn(stream, &behavior, &seen) => {}
            }
        });
    }
}

async fn serve_tcp_conn(mut stream: TcpStream, behavior: &MockBehavior, seen: &Seen) {
    loop {
        let mut len_buf = [0u8; 2];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return;
        }
        let mut request = vec![0u8; u16::from_be_bytes(len_buf) as usize];
        if stream.read_exact(&mut request).await.is_err() {
            return;
        }
        seen.tcp.lock().unwrap().push(request.clone());

        if behavior.silent {
            std::future::pending::<()>().await;
        }

        let response = behavior.reply_to(&request, true);
        let mut framed = (response.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(&response);
        if stream.write_all(&framed).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_echoes_txid_over_udp() {
        let server = MockDnsServer::start(MockBehavior::answer(vec![0, 0, 0x81, 0x80])).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[0x12, 0x34, 0x01, 0x00], server.addr()).await.unwrap();

        let mut buf = vec![0u8; 64];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0x12, 0x34, 0x81, 0x80]);
        assert_eq!(server.udp_hits(), 1);
        assert_eq!(server.tcp_hits(), 0);
    }
}
