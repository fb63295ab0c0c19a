//! URL and filesystem safety checks applied before any network or disk I/O.

use crate::error::FetchError;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// The hosts the file source will talk to unless the configuration extends
/// the set.
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &["data.gdeltproject.org", "api.gdeltproject.org"];

/// The set of hosts requests may be issued against.
#[derive(Debug, Clone)]
pub struct AllowedHosts {
    hosts: BTreeSet<String>,
}

impl Default for AllowedHosts {
    fn default() -> Self {
        AllowedHosts {
            hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl AllowedHosts {
    pub fn with_extra<I: IntoIterator<Item = String>>(extra: I) -> Self {
        let mut allowed = AllowedHosts::default();
        allowed
            .hosts
            .extend(extra.into_iter().map(|h| h.to_ascii_lowercase()));
        allowed
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }
}

/// Validates `url` for fetching: upgrades `http` to `https`, rejects any
/// other scheme, rejects embedded credentials, and rejects hosts outside the
/// allow-set.
pub fn check_url(url: &str, allowed: &AllowedHosts) -> Result<Url, FetchError> {
    let unsafe_url = |reason: String| FetchError::UnsafeUrl {
        url: url.to_string(),
        reason,
    };

    let mut parsed = Url::parse(url).map_err(|err| unsafe_url(format!("not a URL: {err}")))?;

    match parsed.scheme() {
        "https" => {}
        // Loopback endpoints keep plain http so that local emulators and
        // test fixtures are reachable; they still have to be allow-listed.
        "http" if is_loopback(&parsed) => {}
        "http" => {
            // set_scheme only fails for scheme/host combinations that cannot
            // occur once we know the scheme was plain http.
            parsed
                .set_scheme("https")
                .map_err(|_| unsafe_url("cannot upgrade scheme to https".to_string()))?;
            tracing::debug!(%parsed, "upgraded http URL to https");
        }
        other => return Err(unsafe_url(format!("scheme '{other}' is not allowed"))),
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(unsafe_url("embedded credentials".to_string()));
    }

    match parsed.host_str() {
        Some(host) if allowed.contains(host) => Ok(parsed),
        Some(host) => Err(unsafe_url(format!("host '{host}' is not allow-listed"))),
        None => Err(unsafe_url("missing host".to_string())),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

/// Longest cache filename we will produce. Beyond this the tail is replaced
/// with a hash so distinct URLs cannot collide by truncation.
const MAX_FILE_NAME: usize = 180;

/// Derives a filesystem-safe cache filename from a URL. Path separators,
/// `..` runs, and anything outside a conservative character set collapse to
/// `_`; over-long names are truncated with a disambiguating hash suffix.
pub fn cache_file_name(url: &str) -> String {
    let mut name: String = url
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' => c,
            _ => '_',
        })
        .collect();
    while name.contains("..") {
        name = name.replace("..", "_.");
    }
    if name.len() > MAX_FILE_NAME {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        url.hash(&mut hasher);
        let digest = hasher.finish();
        name.truncate(MAX_FILE_NAME - 17);
        name.push('-');
        name.push_str(&format!("{digest:016x}"));
    }
    name
}

/// Resolves a cache filename against the cache root, rejecting anything that
/// would escape it. `name` is expected to already be sanitized; this is the
/// backstop, not the sanitizer.
pub fn resolve_cache_path(root: &Path, name: &str) -> Result<PathBuf, FetchError> {
    let candidate = Path::new(name);
    let mut components = candidate.components();
    let valid = matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
    if !valid || name.contains("..") {
        return Err(FetchError::UnsafeUrl {
            url: name.to_string(),
            reason: "cache key resolves outside the cache root".to_string(),
        });
    }
    Ok(root.join(candidate))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn http_is_upgraded_https_kept() {
        let allowed = AllowedHosts::default();
        let url = check_url(
            "http://data.gdeltproject.org/gdeltv2/a.CSV.zip",
            &allowed,
        )
        .unwrap();
        assert_eq!(url.scheme(), "https");

        let url = check_url(
            "https://data.gdeltproject.org/gdeltv2/a.CSV.zip",
            &allowed,
        )
        .unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn foreign_hosts_schemes_and_credentials_are_rejected() {
        let allowed = AllowedHosts::default();
        assert!(check_url("https://evil.example/x", &allowed).is_err());
        assert!(check_url("ftp://data.gdeltproject.org/x", &allowed).is_err());
        assert!(check_url("https://user:pw@data.gdeltproject.org/x", &allowed).is_err());
    }

    #[test]
    fn extra_hosts_extend_the_default_set() {
        let allowed = AllowedHosts::with_extra(["Mirror.Example".to_string()]);
        assert!(check_url("https://mirror.example/x", &allowed).is_ok());
        assert!(check_url("https://data.gdeltproject.org/x", &allowed).is_ok());
    }

    #[test]
    fn cache_names_are_flat_and_traversal_free() {
        let name = cache_file_name("https://data.gdeltproject.org/../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));

        let root = Path::new("/tmp/cache");
        assert!(resolve_cache_path(root, &name).is_ok());
        assert!(resolve_cache_path(root, "../escape").is_err());
        assert!(resolve_cache_path(root, "a/b").is_err());
    }

    #[test]
    fn long_urls_hash_instead_of_colliding() {
        let base = format!("https://data.gdeltproject.org/{}", "x".repeat(400));
        let a = cache_file_name(&format!("{base}/a"));
        let b = cache_file_name(&format!("{base}/b"));
        assert!(a.len() <= MAX_FILE_NAME);
        assert_ne!(a, b);
    }
}
