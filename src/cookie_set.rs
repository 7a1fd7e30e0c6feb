/// Cookie names that must be present before a request is forwarded upstream.
pub const REQUIRED_COOKIES: [&str; 3] = [
  "__Secure-next-auth.session-token",
  "__Secure-next-auth.callback-url",
  "cf_clearance",
];

/// Cookie names forwarded when present. These rotate or expire on their own,
/// so their absence never blocks a request.
pub const OPTIONAL_COOKIES: [&str; 9] = [
  "__cf_bm",
  "_cfuvid",
  "__Host-next-auth.csrf-token",
  "ajs_anonymous_id",
  "oai-did",
  "oai-dm-tgt-c-240329",
  "intercom-id-dgkjq2bp",
  "intercom-session-dgkjq2bp",
  "intercom-device-id-dgkjq2bp",
];

pub fn is_known_cookie(name: &str) -> bool {
  REQUIRED_COOKIES.contains(&name) || OPTIONAL_COOKIES.contains(&name)
}

/// Ordered name/value cookie mapping. Insertion order is kept so the outgoing
/// `Cookie` header is deterministic; inserting an existing name overwrites its
/// value in place, which makes the source merge order (transport jar, `Cookie`
/// header, `X-ChatGPT-Cookies` header) a last-write-wins contract.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct CookieSet {
  entries: Vec<(String, String)>,
}

impl CookieSet {
  pub fn new() -> CookieSet {
    CookieSet::default()
  }

  pub fn insert(&mut self, name: &str, value: &str) {
    match self.entries.iter_mut().find(|(key, _)| key == name) {
      Some(entry) => entry.1 = value.to_string(),
      None => self.entries.push((name.to_string(), value.to_string())),
    }
  }

  /// Merges a raw cookie header string. Pairs are split on `;`, each pair on
  /// the first `=`, both sides trimmed. Pairs without a `=` are dropped.
  pub fn merge_header(&mut self, raw: &str) {
    for pair in raw.split(';') {
      let pair = pair.trim();
      if pair.is_empty() {
        continue;
      }

      if let Some((name, value)) = pair.split_once('=') {
        self.insert(name.trim(), value.trim());
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .entries
      .iter()
      .find(|(key, _)| key == name)
      .map(|(_, value)| value.as_str())
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Required cookie names absent from this set, in declaration order.
  pub fn missing_required(&self) -> Vec<String> {
    REQUIRED_COOKIES
      .iter()
      .filter(|name| self.get(name).is_none())
      .map(|name| name.to_string())
      .collect()
  }

  /// Serializes the set as a `Cookie` header value in insertion order.
  pub fn to_header_value(&self) -> String {
    let pairs: Vec<String> = self
      .entries
      .iter()
      .map(|(name, value)| format!("{}={}", name, value))
      .collect();

    pairs.join("; ")
  }
}
