//! Canonical origin-pool names derived from service names.

/// Maps a service name onto the XC resource-name alphabet.
///
/// XC object names are lowercase alphanumerics and hyphens, start with a
/// letter and do not end with a hyphen. Dots become hyphens so dotted service
/// names stay readable; everything else outside the alphabet is dropped. The
/// result may be empty when the input contains no letter at all.
///
/// The mapping is pure and idempotent and is the only link between a service
/// and its origin pool, so every remote operation (existence check, create,
/// update, delete) must derive the name through this function.
pub fn canonicalize(service_name: &str) -> String {
    let lowered = service_name.replace('.', "-").to_ascii_lowercase();

    let mut out: String = lowered
        .chars()
        .skip_while(|c| !c.is_ascii_alphabetic())
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    let trimmed = out.trim_end_matches('-').len();
    out.truncate(trimmed);
    out
}

#[cfg(test)]
mod tests {
    use super::canonicalize;

    fn is_valid(name: &str) -> bool {
        if name.is_empty() {
            return true;
        }
        name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
            && !name.ends_with('-')
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    #[test]
    fn replaces_dots_and_lowercases() {
        assert_eq!(canonicalize("My.Service.Name."), "my-service-name");
    }

    #[test]
    fn strips_leading_non_alphabetic() {
        assert_eq!(canonicalize("123-abc"), "abc");
        assert_eq!(canonicalize("-abc"), "abc");
    }

    #[test]
    fn drops_invalid_characters() {
        assert_eq!(canonicalize("svc_one/two"), "svconetwo");
    }

    #[test]
    fn trims_trailing_hyphens() {
        assert_eq!(canonicalize("svc--"), "svc");
    }

    #[test]
    fn no_letter_yields_empty() {
        assert_eq!(canonicalize("123.456"), "");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn output_is_always_valid_and_idempotent() {
        let inputs = [
            "My.Service.Name.",
            "123-abc",
            "UPPER.case-Svc",
            "--9.x--",
            "a_b.c!d",
            "...",
            "web",
        ];
        for input in inputs {
            let once = canonicalize(input);
            assert!(is_valid(&once), "invalid output {once:?} for {input:?}");
            assert_eq!(canonicalize(&once), once, "not idempotent for {input:?}");
        }
    }
}
