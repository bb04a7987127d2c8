//! Getting certificate bytes from wherever a locator points.
//!
//! A locator is a file path, a `file://` URL, an `http(s)://` URL naming a
//! resource, or the address of a TLS server (`tcp://host:port`,
//! `udp://host:port`, `https://host`, or a bare `host:port`). TLS servers are
//! contacted with certificate verification switched off: whatever chain the
//! server presents is captured as-is and judged later by the validator.

use crate::certificate::Certificate;
use crate::decode::{decode, decode_format, Format};
use crate::ocsp::{OcspError, OcspTransport};
use crate::parser::parse_der;
use crate::resolve::CertificateSource;
use crate::TlscertError;
use reqwest::StatusCode;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::{Host, Url};

/// Socket type used to reach a TLS server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// Where a certificate comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    File(PathBuf),
    Http(Url),
    Tls {
        transport: Transport,
        host: String,
        port: u16,
    },
}

impl Locator {
    /// Classify a locator string.
    ///
    /// Strings without `://` are files when they exist on disk or contain a
    /// path separator, and `host:port` addresses of TCP servers otherwise.
    pub fn parse(locator: &str) -> Result<Locator, TlscertError> {
        if !locator.contains("://") {
            if Path::new(locator).exists() || locator.contains(['/', '\\']) {
                return Ok(Locator::File(PathBuf::from(locator)));
            }
            return Locator::parse(&format!("tcp://{}", locator));
        }

        let url = Url::parse(locator).map_err(|e| match e {
            url::ParseError::EmptyHost => TlscertError::MissingHostname,
            other => TlscertError::InvalidLocator {
                locator: locator.to_string(),
                reason: other.to_string(),
            },
        })?;

        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(Locator::File)
                .map_err(|()| TlscertError::InvalidLocator {
                    locator: locator.to_string(),
                    reason: "not a local file path".into(),
                }),
            "http" | "https" => {
                if url.path().is_empty() || url.path() == "/" {
                    let port = url.port_or_known_default().ok_or(TlscertError::MissingPort)?;
                    Ok(Locator::Tls {
                        transport: Transport::Tcp,
                        host: host_of(&url)?,
                        port,
                    })
                } else {
                    Ok(Locator::Http(url))
                }
            }
            "tcp" | "udp" => {
                let transport = if url.scheme() == "udp" {
                    Transport::Udp
                } else {
                    Transport::Tcp
                };
                let host = host_of(&url)?;
                let port = url.port().ok_or(TlscertError::MissingPort)?;
                Ok(Locator::Tls {
                    transport,
                    host,
                    port,
                })
            }
            other => Err(TlscertError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Format implied by the locator's path extension.
    pub fn format(&self) -> Format {
        match self {
            Locator::File(path) => Format::from_path(&path.to_string_lossy()),
            Locator::Http(url) => Format::from_path(url.path()),
            Locator::Tls { .. } => Format::Der,
        }
    }
}

fn host_of(url: &Url) -> Result<String, TlscertError> {
    match url.host() {
        Some(Host::Domain(d)) if !d.is_empty() => Ok(d.to_string()),
        Some(Host::Ipv4(addr)) => Ok(addr.to_string()),
        Some(Host::Ipv6(addr)) => Ok(addr.to_string()),
        _ => Err(TlscertError::MissingHostname),
    }
}

/// Network settings for retrieval.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Bound on establishing a TCP connection.
    pub connect_timeout: Duration,
    /// Bound on each read and write of a handshake, and on whole HTTP
    /// requests (AIA downloads, OCSP).
    pub request_timeout: Duration,
    /// Accept any server certificate on `https://` downloads.
    pub accept_invalid_http_certs: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        RetrieverConfig {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            accept_invalid_http_certs: false,
        }
    }
}

/// Fetches certificates from files, HTTP servers and TLS handshakes.
pub struct Retriever {
    config: RetrieverConfig,
    http: reqwest::blocking::Client,
}

impl Retriever {
    pub fn new(config: RetrieverConfig) -> Result<Self, TlscertError> {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_http_certs)
            .build()
            .map_err(|e| TlscertError::Http(e.to_string()))?;
        Ok(Retriever { config, http })
    }

    /// Retrieve the certificate a locator string points to.
    ///
    /// `format` overrides the format implied by the locator; it does not
    /// apply to TLS handshakes.
    pub fn get_certificate(
        &self,
        locator: &str,
        format: Option<&str>,
    ) -> Result<Certificate, TlscertError> {
        let locator = Locator::parse(locator)?;
        let data = match &locator {
            Locator::Tls {
                transport,
                host,
                port,
            } => return self.handshake(*transport, host, *port),
            Locator::File(path) => read_file(path)?,
            Locator::Http(url) => self.get_bytes(url)?,
        };
        match format {
            Some(hint) => decode(&data, hint),
            None => decode_format(&data, locator.format()),
        }
    }

    /// GET a resource; anything but `200 OK` is an error.
    pub fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, TlscertError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|e| TlscertError::Http(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(TlscertError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response
            .bytes()
            .map_err(|e| TlscertError::Http(e.to_string()))?;
        Ok(body.to_vec())
    }

    fn handshake(
        &self,
        transport: Transport,
        host: &str,
        port: u16,
    ) -> Result<Certificate, TlscertError> {
        let peer = format!("{}:{}", host, port);
        let tls_error = |reason: String| TlscertError::Tls {
            host: peer.clone(),
            reason,
        };

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier))
        .with_no_client_auth();
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| tls_error(e.to_string()))?;
        let mut conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| tls_error(e.to_string()))?;

        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
        debug!(?transport, "TLS handshake with {}", peer);
        let result = match transport {
            Transport::Tcp => {
                let mut sock = self.connect_tcp(&addrs)?;
                complete_handshake(&mut conn, &mut sock)
            }
            Transport::Udp => {
                let mut sock = DatagramStream::connect(&addrs, self.config.request_timeout)?;
                complete_handshake(&mut conn, &mut sock)
            }
        };
        result.map_err(|e| tls_error(e.to_string()))?;

        let presented = conn
            .peer_certificates()
            .ok_or_else(|| TlscertError::NoPeerCertificate(peer.clone()))?;
        let mut presented = presented.iter();
        let leaf = presented
            .next()
            .ok_or_else(|| TlscertError::NoPeerCertificate(peer.clone()))?;
        let mut cert = Certificate::new(parse_der(leaf.as_ref())?).with_hostname(host);
        for der in presented {
            cert.add_to_chain(Certificate::new(parse_der(der.as_ref())?));
        }
        Ok(cert)
    }

    fn connect_tcp(&self, addrs: &[SocketAddr]) -> Result<TcpStream, TlscertError> {
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(addr, self.config.connect_timeout) {
                Ok(sock) => {
                    sock.set_read_timeout(Some(self.config.request_timeout))?;
                    sock.set_write_timeout(Some(self.config.request_timeout))?;
                    return Ok(sock);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(TlscertError::Io(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no address to connect to")
        })))
    }
}

fn complete_handshake<S: Read + Write>(conn: &mut ClientConnection, sock: &mut S) -> io::Result<()> {
    while conn.is_handshaking() {
        conn.complete_io(sock)?;
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlscertError> {
    std::fs::read(path).map_err(|e| {
        TlscertError::Io(io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

impl CertificateSource for Retriever {
    fn fetch(&self, url: &Url) -> Result<Certificate, TlscertError> {
        let data = match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|()| TlscertError::InvalidLocator {
                    locator: url.to_string(),
                    reason: "not a local file path".into(),
                })?;
                read_file(&path)?
            }
            "http" | "https" => self.get_bytes(url)?,
            other => return Err(TlscertError::UnsupportedScheme(other.to_string())),
        };
        decode_format(&data, Format::from_path(url.path()))
    }
}

impl OcspTransport for Retriever {
    fn post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>, OcspError> {
        debug!("POST {} ({} bytes)", url, body.len());
        let transport_error = |e: reqwest::Error| OcspError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/ocsp-request")
            .body(body.to_vec())
            .send()
            .map_err(transport_error)?;
        if response.status() != StatusCode::OK {
            return Err(OcspError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().map_err(transport_error)?.to_vec())
    }
}

/// A connected UDP socket viewed as a byte stream: every write is one
/// datagram, reads drain one received datagram at a time.
struct DatagramStream {
    socket: UdpSocket,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
}

impl DatagramStream {
    const MAX_DATAGRAM: usize = 64 * 1024;

    fn connect(addrs: &[SocketAddr], timeout: Duration) -> io::Result<Self> {
        let mut last_err = None;
        for addr in addrs {
            let local: SocketAddr = if addr.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                ([0u16; 8], 0).into()
            };
            let attempt = UdpSocket::bind(local).and_then(|socket| {
                socket.connect(addr)?;
                socket.set_read_timeout(Some(timeout))?;
                socket.set_write_timeout(Some(timeout))?;
                Ok(socket)
            });
            match attempt {
                Ok(socket) => {
                    return Ok(DatagramStream {
                        socket,
                        buf: vec![0; Self::MAX_DATAGRAM],
                        pos: 0,
                        len: 0,
                    })
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address to connect to")))
    }
}

impl Read for DatagramStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            self.len = self.socket.recv(&mut self.buf)?;
            self.pos = 0;
        }
        let pending = self.buf.get(self.pos..self.len).unwrap_or_default();
        let n = pending.len().min(out.len());
        if let (Some(dst), Some(src)) = (out.get_mut(..n), pending.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos += n;
        Ok(n)
    }
}

impl Write for DatagramStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.socket.send(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Accepts whatever the server presents; the chain is validated afterwards.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
