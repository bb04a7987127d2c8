//! Completing a chain by following Authority Information Access links.
//!
//! Each certificate may name one or more "CA Issuers" URLs. The resolver
//! downloads every one of them, attaches what it gets below the certificate
//! that named it, and keeps going from the downloaded issuer. Failures for
//! individual URLs are logged and skipped; resolving never fails as a whole.

use crate::certificate::{Certificate, Node};
use crate::fingerprint::der_digest;
use crate::TlscertError;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Something that can turn an issuer URL into a certificate.
pub trait CertificateSource {
    fn fetch(&self, url: &Url) -> Result<Certificate, TlscertError>;
}

/// Limits for the AIA walk.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum distance from the leaf at which certificates are downloaded.
    pub max_hops: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig { max_hops: 8 }
    }
}

/// Walks AIA links through a [`CertificateSource`].
pub struct ChainResolver<'a, S: CertificateSource + ?Sized> {
    source: &'a S,
    config: ResolverConfig,
}

impl<'a, S: CertificateSource + ?Sized> ChainResolver<'a, S> {
    pub fn new(source: &'a S, config: ResolverConfig) -> Self {
        ChainResolver { source, config }
    }

    /// Download issuers of `cert` and of every issuer found, attaching each
    /// below the certificate that pointed to it.
    ///
    /// A certificate already visited in this walk (by DER digest) is not
    /// expanded again, so circular AIA graphs terminate.
    pub fn resolve(&self, cert: &mut Certificate) {
        let mut visited: HashSet<[u8; 32]> = HashSet::from([*cert.digest()]);
        let mut work: Vec<(Node, usize)> = vec![(Node::Leaf, 0)];

        while let Some((node, depth)) = work.pop() {
            let urls = match cert.node_info(node) {
                Some(info) => info.ca_issuer_urls().to_vec(),
                None => continue,
            };
            for location in urls {
                if depth >= self.config.max_hops {
                    warn!(
                        max_hops = self.config.max_hops,
                        "AIA chain too long, not following {}", location
                    );
                    break;
                }
                let url = match Url::parse(&location) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!("skipping invalid issuer URL {:?}: {}", location, e);
                        continue;
                    }
                };
                debug!(depth, "downloading issuer from {}", url);
                let fetched = match self.source.fetch(&url) {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        warn!("failed to download issuer from {}: {}", url, e);
                        continue;
                    }
                };
                let fresh = visited.insert(*fetched.digest());
                if let Some(child) = cert.attach(node, fetched) {
                    if fresh {
                        work.push((child, depth + 1));
                    }
                }
            }
        }
    }
}
