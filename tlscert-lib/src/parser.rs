//! Certificate parsing from DER and PEM.

use crate::fields::{AccessLocations, AltName, CertificateInfo, DateTime, DistinguishedName};
use crate::oid;
use crate::util;
use crate::TlscertError;
use x509_parser::extensions::DistributionPointName;
use x509_parser::prelude::*;

/// OpenSSL short names of the name attributes tlscert prints.
const DN_ATTRIBUTES: &[(&str, &str)] = &[
    ("2.5.4.3", "CN"),
    ("2.5.4.4", "SN"),
    ("2.5.4.5", "serialNumber"),
    ("2.5.4.6", "C"),
    ("2.5.4.7", "L"),
    ("2.5.4.8", "ST"),
    ("2.5.4.9", "street"),
    ("2.5.4.10", "O"),
    ("2.5.4.11", "OU"),
    ("2.5.4.12", "title"),
    ("2.5.4.17", "postalCode"),
    ("2.5.4.42", "GN"),
    ("1.2.840.113549.1.9.1", "emailAddress"),
    ("0.9.2342.19200300.100.1.25", "DC"),
];

const SIGNATURE_ALGORITHMS: &[(&str, &str)] = &[
    (oid::SHA1_WITH_RSA, "sha1WithRSAEncryption"),
    (oid::SHA256_WITH_RSA, "sha256WithRSAEncryption"),
    (oid::SHA384_WITH_RSA, "sha384WithRSAEncryption"),
    (oid::SHA512_WITH_RSA, "sha512WithRSAEncryption"),
    (oid::ECDSA_WITH_SHA256, "ecdsa-with-SHA256"),
    (oid::ECDSA_WITH_SHA384, "ecdsa-with-SHA384"),
    (oid::ECDSA_WITH_SHA512, "ecdsa-with-SHA512"),
    (oid::ED25519, "ED25519"),
    (oid::ED448, "ED448"),
];

/// Parse exactly one certificate from DER. Bytes after the certificate
/// are ignored and do not count towards its fingerprint.
pub fn parse_der(input: &[u8]) -> Result<CertificateInfo, TlscertError> {
    if input.is_empty() {
        return Err(TlscertError::Der("empty input".into()));
    }
    let (rest, x509) =
        X509Certificate::from_der(input).map_err(|e| TlscertError::Der(e.to_string()))?;
    let used = input.len().saturating_sub(rest.len());
    let der = input.get(..used).unwrap_or(input);
    Ok(describe(&x509, der))
}

/// Parse every `CERTIFICATE` block of a PEM blob, in order of appearance.
///
/// Blocks with other labels are skipped. A block that does not hold a valid
/// certificate fails the whole blob, and a blob without any certificate
/// block fails with [`TlscertError::NoPemCertificate`].
pub fn parse_pem_blocks(input: &[u8]) -> Result<Vec<CertificateInfo>, TlscertError> {
    let mut certs = Vec::new();
    // The iterator yields an error once the armoured data runs out.
    for pem in Pem::iter_from_buffer(input).map_while(Result::ok) {
        if pem.label == "CERTIFICATE" {
            certs.push(parse_der(&pem.contents).map_err(|e| TlscertError::Pem(e.to_string()))?);
        }
    }
    if certs.is_empty() {
        return Err(TlscertError::NoPemCertificate);
    }
    Ok(certs)
}

fn describe(x509: &X509Certificate, der: &[u8]) -> CertificateInfo {
    let tbs = &x509.tbs_certificate;
    let mut alt_names = Vec::new();
    let mut access = AccessLocations::default();

    for ext in tbs.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                alt_names.extend(san.general_names.iter().map(alt_name));
            }
            ParsedExtension::AuthorityInfoAccess(aia) => {
                for desc in &aia.accessdescs {
                    let GeneralName::URI(uri) = &desc.access_location else {
                        continue;
                    };
                    match desc.access_method.to_id_string().as_str() {
                        oid::ACCESS_OCSP => access.ocsp.push(uri.to_string()),
                        oid::ACCESS_CA_ISSUERS => access.ca_issuers.push(uri.to_string()),
                        _ => {}
                    }
                }
            }
            ParsedExtension::CRLDistributionPoints(cdp) => {
                for point in &cdp.points {
                    if let Some(DistributionPointName::FullName(names)) = &point.distribution_point
                    {
                        access.crl.extend(names.iter().filter_map(|name| match name {
                            GeneralName::URI(uri) => Some(uri.to_string()),
                            _ => None,
                        }));
                    }
                }
            }
            _ => {}
        }
    }

    CertificateInfo {
        serial: format_serial(tbs.raw_serial()),
        raw_serial: tbs.raw_serial().to_vec(),
        subject: distinguished_name(&tbs.subject),
        issuer: distinguished_name(&tbs.issuer),
        not_before: DateTime::from_timestamp(tbs.validity.not_before.timestamp()),
        not_after: DateTime::from_timestamp(tbs.validity.not_after.timestamp()),
        signature_algorithm: lookup(
            SIGNATURE_ALGORITHMS,
            &x509.signature_algorithm.algorithm.to_id_string(),
        ),
        public_key: describe_key(&tbs.subject_pki),
        alt_names,
        access,
        raw_der: der.to_vec(),
    }
}

fn lookup(table: &[(&str, &str)], oid: &str) -> String {
    table
        .iter()
        .find_map(|(k, name)| (*k == oid).then_some(*name))
        .unwrap_or(oid)
        .to_string()
}

/// Serial number as space-separated uppercase hex octets, without leading
/// zero octets.
pub(crate) fn format_serial(raw: &[u8]) -> String {
    util::hex_spaced_upper(util::strip_leading_zeros(raw))
}

fn distinguished_name(name: &X509Name) -> DistinguishedName {
    let components = name
        .iter_attributes()
        .map(|attr| {
            (
                lookup(DN_ATTRIBUTES, &attr.attr_type().to_id_string()),
                attr.as_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect();
    DistinguishedName { components }
}

fn alt_name(name: &GeneralName) -> AltName {
    match name {
        GeneralName::DNSName(dns) => AltName::Dns(dns.to_string()),
        GeneralName::IPAddress(bytes) => AltName::Ip(ip_address(bytes)),
        GeneralName::RFC822Name(email) => AltName::Email(email.to_string()),
        GeneralName::URI(uri) => AltName::Uri(uri.to_string()),
        GeneralName::DirectoryName(dn) => AltName::Other(distinguished_name(dn).to_oneline()),
        other => AltName::Other(format!("{:?}", other)),
    }
}

fn ip_address(bytes: &[u8]) -> String {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes)
            .map(|b| std::net::Ipv4Addr::from(b).to_string())
            .unwrap_or_default(),
        16 => <[u8; 16]>::try_from(bytes)
            .map(|b| std::net::Ipv6Addr::from(b).to_string())
            .unwrap_or_default(),
        _ => hex::encode(bytes),
    }
}

/// Key type with its size, e.g. `RSA 2048` or `EC P-256`.
fn describe_key(spki: &SubjectPublicKeyInfo) -> String {
    match spki.algorithm.algorithm.to_id_string().as_str() {
        oid::RSA_ENCRYPTION => match rsa_modulus_bits(&spki.subject_public_key.data) {
            Some(bits) => format!("RSA {}", bits),
            None => "RSA".into(),
        },
        oid::EC_PUBLIC_KEY => format!("EC {}", extract_ec_curve(&spki.algorithm)),
        oid::ED25519 => "Ed25519".into(),
        oid::ED448 => "Ed448".into(),
        other => other.to_string(),
    }
}

/// Bit length of the modulus in an RSAPublicKey structure.
fn rsa_modulus_bits(data: &[u8]) -> Option<usize> {
    let items = crate::der::read_sequence(data).ok()?;
    let modulus = util::strip_leading_zeros(items.first()?.data());
    let top = usize::try_from(modulus.first()?.leading_zeros()).ok()?;
    Some(modulus.len() * 8 - top)
}

/// Name of the curve in EC key parameters (`P-256`, `P-384`, `P-521`), or
/// its OID for other curves.
pub(crate) fn extract_ec_curve(algorithm: &AlgorithmIdentifier) -> String {
    let Some(curve) = algorithm.parameters.as_ref().and_then(|p| p.as_oid().ok()) else {
        return "unknown".into();
    };
    match curve.to_id_string().as_str() {
        oid::CURVE_P256 => "P-256".into(),
        oid::CURVE_P384 => "P-384".into(),
        oid::CURVE_P521 => "P-521".into(),
        other => other.to_string(),
    }
}
