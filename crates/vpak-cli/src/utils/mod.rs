use camino::{Utf8Path, Utf8PathBuf};

/// Print formatted text indented by four spaces, line by line.
#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let text = format!($($arg)*);
        for line in text.lines() {
            println!("    {}", line);
        }
    }};
}

/// Parent directory of `path`, or the current directory for bare names.
pub fn parent_or_cwd(path: &Utf8Path) -> Utf8PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    }
}
