//! The certificate entity and its chain.
//!
//! A [`Certificate`] owns one leaf record plus an arena of chain records.
//! Every record is identified by the SHA-256 of its DER encoding and keeps
//! its own links, keyed by the subject name of the linked record. Nested
//! chains (a chain member's own chain) are plain links between arena
//! records, so no record ever owns another and cycles in the issuer graph
//! cannot form ownership cycles.
//!
//! Links are append-only: the first record attached under a subject name
//! wins and later candidates for the same subject are ignored.

use crate::fields::CertificateInfo;
use crate::fingerprint::der_digest;
use std::collections::{HashMap, HashSet, VecDeque};

/// Index of a chain record inside a [`Certificate`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CertId(usize);

/// A position in the chain graph: the leaf itself or an arena record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Node {
    Leaf,
    Member(CertId),
}

#[derive(Debug, Clone, Default)]
struct Links(Vec<(String, CertId)>);

impl Links {
    fn insert(&mut self, subject: String, id: CertId) -> bool {
        if self.0.iter().any(|(s, _)| *s == subject) {
            return false;
        }
        self.0.push((subject, id));
        true
    }

    fn ids(&self) -> impl Iterator<Item = CertId> + '_ {
        self.0.iter().map(|(_, id)| *id)
    }
}

#[derive(Debug, Clone)]
struct Record {
    info: CertificateInfo,
    digest: [u8; 32],
    subject: String,
    links: Links,
}

impl Record {
    fn new(info: CertificateInfo) -> Self {
        Record {
            digest: der_digest(&info.raw_der),
            subject: info.subject_string(),
            info,
            links: Links::default(),
        }
    }
}

/// One certificate with the chain discovered for it.
#[derive(Debug, Clone)]
pub struct Certificate {
    leaf: Record,
    members: Vec<Record>,
    by_digest: HashMap<[u8; 32], CertId>,
    hostname: Option<String>,
}

impl Certificate {
    /// Wrap a parsed certificate with an empty chain.
    pub fn new(info: CertificateInfo) -> Self {
        Certificate {
            leaf: Record::new(info),
            members: Vec::new(),
            by_digest: HashMap::new(),
            hostname: None,
        }
    }

    /// Record the host this certificate was presented for.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// The parsed leaf certificate.
    pub fn info(&self) -> &CertificateInfo {
        &self.leaf.info
    }

    /// Host name to match during validation, set for live handshakes only.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// SHA-256 of the leaf DER; two entities are the same certificate iff
    /// their digests are equal.
    pub fn digest(&self) -> &[u8; 32] {
        &self.leaf.digest
    }

    /// Attach `candidate`, together with everything already chained to it,
    /// below the leaf.
    ///
    /// Ignored when `candidate` is this very certificate or when the leaf
    /// already links a certificate with the same subject name. Returns
    /// whether a new link was made.
    pub fn add_to_chain(&mut self, candidate: Certificate) -> bool {
        let before = self.leaf.links.0.len();
        self.attach(Node::Leaf, candidate);
        self.leaf.links.0.len() > before
    }

    /// Every certificate reachable from the leaf through direct or nested
    /// links, at most one per subject name.
    ///
    /// Links are walked breadth-first in insertion order and the first
    /// record seen for a subject wins, so a certificate attached close to
    /// the leaf shadows a different certificate with the same subject found
    /// deeper in the graph. The leaf itself is never part of its chain.
    pub fn chain(&self) -> Vec<&CertificateInfo> {
        self.chain_ids(Node::Leaf)
            .into_iter()
            .filter_map(|id| self.record(id))
            .map(|r| &r.info)
            .collect()
    }

    /// Each member of [`chain`](Self::chain) as a certificate of its own,
    /// carrying the part of the chain reachable from it.
    pub fn chain_certificates(&self) -> Vec<Certificate> {
        self.chain_ids(Node::Leaf)
            .into_iter()
            .filter_map(|id| self.detach(id))
            .collect()
    }

    /// Chain member with the given one-line subject name.
    pub fn chain_member(&self, subject: &str) -> Option<&CertificateInfo> {
        self.chain_ids(Node::Leaf)
            .into_iter()
            .filter_map(|id| self.record(id))
            .find(|r| r.subject == subject)
            .map(|r| &r.info)
    }

    /// The chain member whose subject is this certificate's issuer.
    pub fn issuer(&self) -> Option<&CertificateInfo> {
        self.chain_member(&self.leaf.info.issuer_string())
    }

    /// Whether the leaf names a CRL distribution point.
    pub fn has_crl(&self) -> bool {
        crate::crl::has_crl(&self.leaf.info)
    }

    pub(crate) fn node_info(&self, node: Node) -> Option<&CertificateInfo> {
        match node {
            Node::Leaf => Some(&self.leaf.info),
            Node::Member(id) => self.record(id).map(|r| &r.info),
        }
    }

    /// Attach `candidate` and its own chain below `parent`.
    ///
    /// Returns the node now holding the candidate, or `None` when it is the
    /// leaf or `parent` itself.
    pub(crate) fn attach(&mut self, parent: Node, candidate: Certificate) -> Option<Node> {
        if candidate.leaf.digest == self.leaf.digest {
            return None;
        }
        let Certificate {
            mut leaf, members, ..
        } = candidate;

        // Re-home the candidate's arena first so its nested links survive.
        let mut remap: Vec<Option<CertId>> = Vec::with_capacity(members.len());
        let mut pending: Vec<(Option<CertId>, Links)> = Vec::with_capacity(members.len() + 1);
        for mut record in members {
            let links = std::mem::take(&mut record.links);
            let id = self.intern(record);
            remap.push(id);
            pending.push((id, links));
        }
        let leaf_links = std::mem::take(&mut leaf.links);
        let id = self.intern(leaf);
        pending.push((id, leaf_links));

        for (owner, links) in pending {
            let Some(owner) = owner else { continue };
            for old in links.ids() {
                if let Some(Some(target)) = remap.get(old.0) {
                    self.link(Node::Member(owner), *target);
                }
            }
        }

        let id = id?;
        if parent == Node::Member(id) {
            return None;
        }
        self.link(parent, id);
        Some(Node::Member(id))
    }

    /// Store an unlinked record in the arena, reusing an existing record with
    /// the same digest. The leaf is never stored.
    fn intern(&mut self, record: Record) -> Option<CertId> {
        if record.digest == self.leaf.digest {
            return None;
        }
        if let Some(id) = self.by_digest.get(&record.digest) {
            return Some(*id);
        }
        let id = CertId(self.members.len());
        self.by_digest.insert(record.digest, id);
        self.members.push(record);
        Some(id)
    }

    fn link(&mut self, from: Node, to: CertId) -> bool {
        if from == Node::Member(to) {
            return false;
        }
        let Some(subject) = self.record(to).map(|r| r.subject.clone()) else {
            return false;
        };
        match from {
            Node::Leaf => self.leaf.links.insert(subject, to),
            Node::Member(id) => match self.members.get_mut(id.0) {
                Some(record) => record.links.insert(subject, to),
                None => false,
            },
        }
    }

    fn detach(&self, id: CertId) -> Option<Certificate> {
        let mut cert = Certificate::new(self.record(id)?.info.clone());
        for member in self.chain_ids(Node::Member(id)) {
            if let Some(record) = self.record(member) {
                cert.add_to_chain(Certificate::new(record.info.clone()));
            }
        }
        Some(cert)
    }

    fn record(&self, id: CertId) -> Option<&Record> {
        self.members.get(id.0)
    }

    fn links_of(&self, node: Node) -> Option<&Links> {
        match node {
            Node::Leaf => Some(&self.leaf.links),
            Node::Member(id) => self.record(id).map(|r| &r.links),
        }
    }

    fn chain_ids(&self, start: Node) -> Vec<CertId> {
        let mut subjects: HashSet<&str> = HashSet::new();
        let mut visited: HashSet<CertId> = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<Node> = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            let Some(links) = self.links_of(node) else {
                continue;
            };
            for id in links.ids() {
                if !visited.insert(id) {
                    continue;
                }
                if let Some(record) = self.record(id) {
                    if subjects.insert(record.subject.as_str()) {
                        out.push(id);
                    }
                }
                queue.push_back(Node::Member(id));
            }
        }
        out
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.leaf.digest == other.leaf.digest
    }
}

impl Eq for Certificate {}
