//! Turning an input blob into a [`Certificate`].

use crate::certificate::Certificate;
use crate::fields::CertificateInfo;
use crate::parser::{parse_der, parse_pem_blocks};
use crate::{der, pkcs7, TlscertError};
use std::path::Path;
use std::str::FromStr;

/// Encoding of a certificate blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Try DER, then PEM.
    #[default]
    Auto,
    Der,
    Pem,
    /// PKCS#7 signed-data bundle (`.p7c`, `.p7b`).
    P7c,
    /// PKCS#12 archive (`.pfx`, `.p12`) protected by an empty password.
    Pfx,
}

impl Format {
    /// Format implied by a file extension. Extensions that are not
    /// certificate formats fall back to [`Format::Auto`].
    pub fn from_path(path: &str) -> Format {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.to_ascii_lowercase().parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for Format {
    type Err = TlscertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "cer" | "crt" => Ok(Format::Auto),
            "der" => Ok(Format::Der),
            "pem" => Ok(Format::Pem),
            "p7c" | "p7b" => Ok(Format::P7c),
            "pfx" | "p12" => Ok(Format::Pfx),
            other => Err(TlscertError::UnknownFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Format::Auto => "auto",
            Format::Der => "der",
            Format::Pem => "pem",
            Format::P7c => "p7c",
            Format::Pfx => "pfx",
        };
        f.write_str(name)
    }
}

/// Decode `data` according to a textual format hint.
///
/// An empty hint (or `cer`/`crt`) auto-detects DER or PEM. An unrecognised
/// hint fails with [`TlscertError::UnknownFormat`] before `data` is looked at.
pub fn decode(data: &[u8], hint: &str) -> Result<Certificate, TlscertError> {
    let format: Format = hint.parse()?;
    decode_format(data, format)
}

/// Decode `data` in the given format. The first certificate found is the
/// leaf; any further certificates in the blob are attached to its chain.
pub fn decode_format(data: &[u8], format: Format) -> Result<Certificate, TlscertError> {
    match format {
        Format::Der => parse_der(data).map(Certificate::new),
        Format::Pem => bundle(parse_pem_blocks(data)?),
        Format::Auto => match parse_der(data) {
            Ok(info) => Ok(Certificate::new(info)),
            Err(_) => parse_pem_blocks(data)
                .map_err(|_| TlscertError::NeitherDerNorPem)
                .and_then(bundle),
        },
        Format::P7c => bundle(pkcs7::certificates(data)?),
        Format::Pfx => decode_pfx(data).map(Certificate::new),
    }
}

fn bundle(certs: Vec<CertificateInfo>) -> Result<Certificate, TlscertError> {
    let mut certs = certs.into_iter();
    let leaf = certs
        .next()
        .ok_or_else(|| TlscertError::Parse("no certificate in bundle".into()))?;
    let mut cert = Certificate::new(leaf);
    for info in certs {
        cert.add_to_chain(Certificate::new(info));
    }
    Ok(cert)
}

fn decode_pfx(data: &[u8]) -> Result<CertificateInfo, TlscertError> {
    let pfx = p12::PFX::parse(data).map_err(|e| TlscertError::Pkcs12(format!("{:?}", e)))?;
    check_pfx_algorithms(&pfx)?;
    if !pfx.verify_mac("") {
        return Err(TlscertError::Pkcs12Password);
    }
    let bags = pfx
        .cert_x509_bags("")
        .map_err(|e| TlscertError::Pkcs12(format!("{:?}", e)))?;
    let der = bags
        .first()
        .ok_or_else(|| TlscertError::Pkcs12("no certificate in archive".into()))?;
    parse_der(der)
}

/// Reject archives whose MAC or bag encryption `p12` cannot handle (SHA-256
/// MAC, PBES2/AES), so they never reach the password check.
fn check_pfx_algorithms(pfx: &p12::PFX) -> Result<(), TlscertError> {
    if let Some(mac) = &pfx.mac_data {
        match &mac.mac.digest_algorithm {
            p12::AlgorithmIdentifier::Sha1 => {}
            p12::AlgorithmIdentifier::OtherAlg(alg) => {
                return Err(TlscertError::Pkcs12(format!(
                    "unsupported MAC algorithm {}",
                    alg.algorithm_type
                )))
            }
            _ => return Err(TlscertError::Pkcs12("unsupported MAC algorithm".into())),
        }
    }
    let Some(safe) = pfx.auth_safe.data(&[]) else {
        return Ok(());
    };
    let Ok(contents) = der::read_sequence(&safe) else {
        return Ok(());
    };
    for content in &contents {
        let Ok(p12::ContentInfo::EncryptedData(encrypted)) = p12::ContentInfo::from_der(content.raw)
        else {
            continue;
        };
        if let p12::AlgorithmIdentifier::OtherAlg(alg) =
            &encrypted.encrypted_content_info.content_encryption_algorithm
        {
            return Err(TlscertError::Pkcs12(format!(
                "unsupported encryption algorithm {}",
                alg.algorithm_type
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!("".parse::<Format>().unwrap(), Format::Auto);
        assert_eq!("crt".parse::<Format>().unwrap(), Format::Auto);
        assert_eq!("p7b".parse::<Format>().unwrap(), Format::P7c);
        assert_eq!("p12".parse::<Format>().unwrap(), Format::Pfx);
        let err = "foo".parse::<Format>().unwrap_err();
        assert_eq!(err.to_string(), "unknown format \"foo\"");
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path("/a/b/cert.PEM"), Format::Pem);
        assert_eq!(Format::from_path("/ca/root.p7c"), Format::P7c);
        assert_eq!(Format::from_path("/index.html"), Format::Auto);
        assert_eq!(Format::from_path("/"), Format::Auto);
    }
}
