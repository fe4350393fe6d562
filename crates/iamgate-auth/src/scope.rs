//! Region and service that make up the SigV4 credential scope.

/// Region used when neither the host nor the configuration names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Service used when neither the host nor the configuration names one.
pub const DEFAULT_SERVICE: &str = "execute-api";

/// The `<region>/<service>` pair a signature is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningScope {
    /// AWS region, e.g. `ap-northeast-1`.
    pub region: String,
    /// AWS service, e.g. `execute-api`.
    pub service: String,
}

impl SigningScope {
    /// Create a scope from explicit values.
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }

    /// Work out the scope for `host`, letting explicit overrides win.
    ///
    /// # Examples
    ///
    /// ```
    /// use iamgate_auth::scope::SigningScope;
    ///
    /// let scope = SigningScope::resolve(
    ///     "example.execute-api.ap-northeast-1.amazonaws.com",
    ///     None,
    ///     None,
    /// );
    /// assert_eq!(scope.region, "ap-northeast-1");
    /// assert_eq!(scope.service, "execute-api");
    /// ```
    #[must_use]
    pub fn resolve(host: &str, region: Option<&str>, service: Option<&str>) -> Self {
        let (parsed_service, parsed_region) = parse_host(host).unwrap_or((None, None));

        Self {
            region: region
                .map(ToOwned::to_owned)
                .or(parsed_region)
                .unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            service: service
                .map(ToOwned::to_owned)
                .or(parsed_service)
                .unwrap_or_else(|| DEFAULT_SERVICE.to_owned()),
        }
    }

    /// The credential scope string for a `YYYYMMDD` date.
    #[must_use]
    pub fn credential_scope(&self, date: &str) -> String {
        format!("{date}/{}/{}/aws4_request", self.region, self.service)
    }
}

/// Extract `(service, region)` from an `amazonaws.com` host name.
///
/// `<anything>.<service>.<region>.amazonaws.com[.cn]` yields both parts,
/// `<service>.amazonaws.com` yields only the service. Hosts outside
/// `amazonaws.com` yield `None`.
fn parse_host(host: &str) -> Option<(Option<String>, Option<String>)> {
    let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
    let prefix = host
        .strip_suffix(".amazonaws.com")
        .or_else(|| host.strip_suffix(".amazonaws.com.cn"))?;

    let labels: Vec<&str> = prefix.split('.').filter(|l| !l.is_empty()).collect();
    match labels.as_slice() {
        [] => None,
        [service] => Some((Some((*service).to_owned()), None)),
        [.., service, region] => Some((Some((*service).to_owned()), Some((*region).to_owned()))),
    }
}
