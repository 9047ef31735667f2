/// Longest file name most Linux filesystems accept, in bytes.
const NAME_MAX: usize = 255;

/// Make a decoded URL segment safe to use as a single file name.
///
/// Path separators, NUL and control characters become `_`; surrounding
/// whitespace and dots are trimmed (so `.` and `..` end up empty); the result
/// is cut to `NAME_MAX` bytes on a character boundary.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_become_underscores() {
        assert_eq!(sanitize_file_name("a/b\\c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_file_name("nul\0name\n"), "nul_name_");
    }

    #[test]
    fn dot_names_are_emptied() {
        assert_eq!(sanitize_file_name(".."), "");
        assert_eq!(sanitize_file_name(" .hidden. "), "hidden");
    }

    #[test]
    fn keeps_inner_spaces() {
        assert_eq!(sanitize_file_name("my report.pdf"), "my report.pdf");
    }

    #[test]
    fn long_names_cut_on_char_boundary() {
        let long = "é".repeat(200);
        let out = sanitize_file_name(&long);
        assert!(out.len() <= NAME_MAX);
        assert_eq!(out.len(), 254);
    }
}
