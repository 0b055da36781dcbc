//! A radix tree over reversed ASCII host strings, answering "is this
//! `(scheme, host, port)` permitted?" with no allocation on the hot path.
//!
//! Hosts are indexed **right-to-left** (i.e. by reversed bytes) so that
//! hosts sharing a suffix — `a.example.com`, `b.example.com`,
//! `*.example.com` — share tree storage. Branching happens on individual
//! bytes (kept in a sorted `edges` array per node, mirroring the sorted
//! `Vec` idiom used throughout this crate) with runs of unbranched bytes
//! compressed into a node's `suffix`.
//!
//! Matching proceeds byte-by-byte down explicit tree edges rather than via
//! any `str::ends_with`-style substring check, which is what keeps a host
//! like `barfoo.com` from being mistaken for a suffix match against a
//! pattern for `foo.com` — see [`OriginTree::contains`] and the
//! regression test pinned against GHSA-vhxv-fg4m-p2w8.

use crate::origin::PatternKind;

/// Offset added (well: subtracted) to a port value to move it into a
/// disjoint range meaning "this entry also applies under arbitrary
/// subdomains of this node", per spec — chosen comfortably larger than
/// 65535 so the two ranges never collide.
const PORT_OFFSET: i64 = 1_000_000;

/// Pre-offset sentinel meaning "any port".
const ANY_PORT: i64 = -1;

/// Pre-offset sentinel meaning "no explicit port" (the origin's port was
/// simply absent from the `Origin` header — i.e. the scheme's implicit
/// default was used and never spelled out).
const ABSENT_PORT: i64 = 0;

fn raw_port(port: Option<u16>) -> i64 {
    match port {
        None => ABSENT_PORT,
        Some(p) => p as i64,
    }
}

fn encode_port(raw: i64, arbitrary_subs: bool) -> i64 {
    if arbitrary_subs {
        raw - PORT_OFFSET
    } else {
        raw
    }
}

fn decode_port(stored: i64) -> (i64, bool) {
    if stored >= -1 {
        (stored, false)
    } else {
        (stored + PORT_OFFSET, true)
    }
}

/// Whether an encoded `stored` port entry matches an incoming request's
/// `(port, any wildcard)` under the given `arbitrary_subs` context.
fn port_entry_matches(stored: i64, arbitrary_subs: bool, requested_raw: i64) -> bool {
    let (raw, subs) = decode_port(stored);
    subs == arbitrary_subs && (raw == ANY_PORT || raw == requested_raw)
}

#[derive(Debug, Clone)]
struct Node {
    /// Bytes of reversed host matched along this node, beyond the single
    /// byte consumed to reach it from its parent (which lives in the
    /// parent's `edges` array).
    suffix: Box<str>,
    /// Sorted, unique first bytes of each child's edge label.
    edges: Vec<u8>,
    /// Parallel to `edges`.
    children: Vec<Box<Node>>,
    /// Sorted, unique scheme names terminating exactly at this node.
    schemes: Vec<Box<str>>,
    /// Parallel to `schemes`: sorted, encoded port entries (see
    /// [`encode_port`]).
    ports: Vec<Vec<i64>>,
}

impl Node {
    fn leaf(suffix: &str) -> Self {
        Node {
            suffix: suffix.into(),
            edges: Vec::new(),
            children: Vec::new(),
            schemes: Vec::new(),
            ports: Vec::new(),
        }
    }

    fn add_entry(&mut self, scheme: &str, port_code: i64) {
        match self.schemes.binary_search_by(|s| s.as_ref().cmp(scheme)) {
            Ok(i) => insert_port(&mut self.ports[i], port_code),
            Err(i) => {
                self.schemes.insert(i, scheme.into());
                self.ports.insert(i, vec![port_code]);
            }
        }
    }

    fn has_entry(&self, scheme: &str, requested_raw: i64, arbitrary_subs: bool) -> bool {
        let Ok(i) = self.schemes.binary_search_by(|s| s.as_ref().cmp(scheme)) else {
            return false;
        };
        self.ports[i]
            .iter()
            .any(|&stored| port_entry_matches(stored, arbitrary_subs, requested_raw))
    }
}

/// Inserts `port_code` into `ports` (sorted, unique), skipping the insert
/// if an "any port" sentinel already covers it for the same
/// arbitrary-subdomain-ness (redundancy suppression, spec §4.C step 4).
fn insert_port(ports: &mut Vec<i64>, port_code: i64) {
    let (_, subs) = decode_port(port_code);
    let any_sentinel = encode_port(ANY_PORT, subs);
    if port_code != any_sentinel && ports.binary_search(&any_sentinel).is_ok() {
        return;
    }
    match ports.binary_search(&port_code) {
        Ok(_) => {}
        Err(i) => ports.insert(i, port_code),
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Splits `node` so that its `suffix` is exactly `node.suffix[..at]`,
/// pushing its current contents (remaining suffix, edges, entries) down
/// into a new child node.
fn split_node_at(node: &mut Node, at: usize) {
    debug_assert!(at < node.suffix.len());
    let remainder = &node.suffix[at..];
    let edge_byte = remainder.as_bytes()[0];
    let child_suffix = &remainder[1..];

    let mut child = Node::leaf(child_suffix);
    std::mem::swap(&mut child.edges, &mut node.edges);
    std::mem::swap(&mut child.children, &mut node.children);
    std::mem::swap(&mut child.schemes, &mut node.schemes);
    std::mem::swap(&mut child.ports, &mut node.ports);

    node.suffix = node.suffix[..at].into();
    node.edges = vec![edge_byte];
    node.children = vec![Box::new(child)];
}

fn insert_rec(node: &mut Node, key: &str, scheme: &str, port_code: i64) {
    let common = common_prefix_len(&node.suffix, key);
    if common < node.suffix.len() {
        split_node_at(node, common);
    }
    if common == key.len() {
        node.add_entry(scheme, port_code);
        return;
    }
    let rest = &key[common..];
    let first = rest.as_bytes()[0];
    match node.edges.binary_search(&first) {
        Ok(i) => insert_rec(&mut node.children[i], &rest[1..], scheme, port_code),
        Err(i) => {
            let mut child = Node::leaf(&rest[1..]);
            child.add_entry(scheme, port_code);
            node.edges.insert(i, first);
            node.children.insert(i, Box::new(child));
        }
    }
}

/// Reverses an ASCII string byte-for-byte (hosts are guaranteed ASCII by
/// [`crate::origin`] before they reach this module).
fn reverse_ascii(s: &str) -> String {
    s.bytes().rev().map(|b| b as char).collect()
}

/// A single parsed origin pattern as produced by [`OriginTree::elems`],
/// enough to reconstruct a canonical pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// The pattern's scheme.
    pub scheme: String,
    /// The pattern's host (without a `*.` prefix).
    pub host: String,
    /// Whether this entry matches arbitrary subdomains of `host`.
    pub wildcard_subdomains: bool,
    /// `None` = no explicit port, `Some(None)` = wildcard port, `Some(Some(p))` = exact port `p`.
    pub port: Option<Option<u16>>,
}

/// An indexed set of permitted `(scheme, host, port)` origins.
///
/// Construction is insertion-order-independent (spec §8 property 2): the
/// tree is built by repeated [`OriginTree::insert`] calls and answers
/// `contains` identically regardless of the order patterns were supplied
/// in, because every insertion fully reconciles the shared-suffix
/// structure before returning.
#[derive(Debug, Clone, Default)]
pub struct OriginTree {
    root: Option<Box<Node>>,
}

impl OriginTree {
    /// An empty tree (matches nothing).
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Whether the tree holds no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Inserts one `(scheme, host, port)` entry.
    ///
    /// `host` is the *unreversed* domain or IP literal (no `*.` prefix —
    /// pass `wildcard_subdomains = true` instead). `port`: `None` = no
    /// explicit port; `Some(None)` = wildcard port; `Some(Some(p))` =
    /// exact port `p`.
    pub fn insert(
        &mut self,
        scheme: &str,
        host: &str,
        wildcard_subdomains: bool,
        port: Option<Option<u16>>,
    ) {
        let raw = match port {
            None => ABSENT_PORT,
            Some(None) => ANY_PORT,
            Some(Some(p)) => p as i64,
        };
        let code = encode_port(raw, wildcard_subdomains);
        let key = reverse_ascii(host);
        let root = self.root.get_or_insert_with(|| Box::new(Node::leaf("")));
        insert_rec(root, &key, scheme, code);
    }

    /// Convenience wrapper for inserting a parsed [`crate::origin::OriginPattern`].
    pub fn insert_pattern(&mut self, pattern: &crate::origin::OriginPattern) {
        use crate::origin::PortSpec;
        let wildcard_subdomains = matches!(pattern.kind(), PatternKind::WildcardSubdomains);
        let port = match pattern.port() {
            PortSpec::Absent => None,
            PortSpec::Wildcard => Some(None),
            PortSpec::Exact(p) => Some(Some(p)),
        };
        self.insert(pattern.scheme(), pattern.host(), wildcard_subdomains, port);
    }

    /// Reports whether `(scheme, host, port)` is permitted.
    ///
    /// Descends the tree byte-by-byte over `host`, read back-to-front (no
    /// reversed copy is built: the walk just indexes `host` from its end).
    /// A node boundary that exactly consumes the whole remaining host is
    /// checked against that node's exact (non-wildcard) entries. A node
    /// boundary reached with more host left to consume is checked against
    /// that node's wildcard-subdomain entries **only if** the very next
    /// remaining byte is `.` — without that guard, a host like
    /// `evilfoo.com` would wrongly satisfy a wildcard rooted at `foo.com`,
    /// which is the GHSA-vhxv-fg4m-p2w8 bug class this check exists to
    /// prevent. Matching then continues descending regardless, in case a
    /// more specific (deeper) pattern also applies.
    pub fn contains(&self, scheme: &str, host: &str, port: Option<u16>) -> bool {
        let Some(root) = &self.root else {
            return false;
        };
        let requested_raw = raw_port(port);
        contains_rec(root, host.as_bytes(), host.len(), scheme, requested_raw)
    }

    /// Enumerates every entry in a deterministic, stable (DFS-over-sorted-edges)
    /// order. Used only by configuration readback (`Cors::config`); the
    /// order is not claimed to match any externally documented total
    /// order (spec §9 open question), only to be stable across calls on
    /// the same tree.
    pub fn elems(&self) -> Vec<TreeEntry> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            collect_rec(root, String::new(), &mut out);
        }
        out
    }
}

/// Length of the common prefix between `suffix` (forward bytes) and the
/// reversed reading of `host[..end]` (i.e. `host[end-1], host[end-2], ...`),
/// without materializing either as a reversed string.
fn common_prefix_len_rev(suffix: &[u8], host: &[u8], end: usize) -> usize {
    let mut i = 0;
    while i < suffix.len() && i < end && suffix[i] == host[end - 1 - i] {
        i += 1;
    }
    i
}

/// `host[..end]`, read back-to-front, is the remaining key still to match.
fn contains_rec(node: &Node, host: &[u8], end: usize, scheme: &str, requested_raw: i64) -> bool {
    let common = common_prefix_len_rev(node.suffix.as_bytes(), host, end);
    if common != node.suffix.len() {
        return false;
    }
    let end = end - common;
    if end == 0 {
        return node.has_entry(scheme, requested_raw, false);
    }
    let next_byte = host[end - 1];
    if next_byte == b'.' && node.has_entry(scheme, requested_raw, true) {
        return true;
    }
    match node.edges.binary_search(&next_byte) {
        Ok(i) => contains_rec(&node.children[i], host, end - 1, scheme, requested_raw),
        Err(_) => false,
    }
}

fn collect_rec(node: &Node, prefix_reversed: String, out: &mut Vec<TreeEntry>) {
    let mut acc = prefix_reversed;
    acc.push_str(&node.suffix);
    let host = reverse_ascii(&acc);

    for (scheme, ports) in node.schemes.iter().zip(node.ports.iter()) {
        for &stored in ports {
            let (raw, wildcard_subdomains) = decode_port(stored);
            let port = match raw {
                ABSENT_PORT => None,
                ANY_PORT => Some(None),
                p => Some(Some(p as u16)),
            };
            out.push(TreeEntry {
                scheme: scheme.to_string(),
                host: host.clone(),
                wildcard_subdomains,
                port,
            });
        }
    }

    for (&edge_byte, child) in node.edges.iter().zip(node.children.iter()) {
        let mut child_prefix = acc.clone();
        child_prefix.push(edge_byte as char);
        collect_rec(child, child_prefix, out);
    }
}
