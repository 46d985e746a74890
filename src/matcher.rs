//! Domain comparison used by classification and form defaults.

/// Lowercase a domain and strip the leading dot cookies often carry.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// True when `candidate_domain` equals `project_domain` or is one of its
/// subdomains (`analytics.example.com` matches `example.com`).
///
/// An empty project domain matches nothing.
pub fn match_domain(project_domain: &str, candidate_domain: &str) -> bool {
    let project = normalize_domain(project_domain);
    let candidate = normalize_domain(candidate_domain);

    if project.is_empty() || candidate.is_empty() {
        return false;
    }

    if candidate == project {
        return true;
    }

    candidate
        .strip_suffix(project.as_str())
        .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Provider codes are registrable domains (`google.com`); a plain ends-with
/// check decides whether a discovered domain belongs to the provider.
pub fn provider_code_matches(provider_code: &str, domain: &str) -> bool {
    let code = normalize_domain(provider_code);
    !code.is_empty() && normalize_domain(domain).ends_with(&code)
}
