use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{TcpStream, UdpSocket};

/// Opens the sockets a forward attempt talks through.
///
/// The UDP socket comes back connected to `server`, so only datagrams from
/// that peer are delivered.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial_udp(&self, server: SocketAddr) -> io::Result<UdpSocket>;

    async fn dial_tcp(&self, server: SocketAddr) -> io::Result<TcpStream>;
}

/// Dialer backed by the host network stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDialer;

const UDP_RECV_BUFFER_BYTES: usize = 64 * 1024;

impl SystemDialer {
    fn udp_socket(server: SocketAddr) -> io::Result<UdpSocket> {
        use socket2::{Domain, Protocol, Socket, Type};

        let (domain, bind_addr) = if server.is_ipv4() {
            (Domain::IPV4, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        } else {
            (Domain::IPV6, SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)))
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_recv_buffer_size(UDP_RECV_BUFFER_BYTES)?;
        socket.bind(&bind_addr.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket)
    }
}

#[async_trait]
impl Dialer for SystemDialer {
    async fn dial_udp(&self, server: SocketAddr) -> io::Result<UdpSocket> {
        let socket = Self::udp_socket(server)?;
        socket.connect(server).await?;
        Ok(socket)
    }

    async fn dial_tcp(&self, server: SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(server).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
