use std::path::{Path, PathBuf};
use uzers::os::unix::UserExt;

/// Expand tilde (~) in paths to actual home directories.
///
/// Supports:
/// - `~` or `~/path` - expands to current user's home directory
/// - `~username/path` - expands to the specified user's home directory
///
/// Returns `None` when the home directory cannot be determined.
///
/// # Examples
///
/// ```
/// use runner_fleet::utils::path::expand_tilde;
///
/// let path = expand_tilde("~/actions-runners").unwrap();
/// assert!(path.ends_with("actions-runners"));
///
/// let path = expand_tilde("/srv/runners").unwrap();
/// assert_eq!(path.to_str(), Some("/srv/runners"));
/// ```
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_str()?;

    let Some(after_tilde) = path_str.strip_prefix('~') else {
        return Some(path.to_path_buf());
    };

    if after_tilde.is_empty() || after_tilde.starts_with('/') {
        let home = std::env::var("HOME").ok()?;
        return Some(PathBuf::from(home).join(after_tilde.trim_start_matches('/')));
    }

    // ~username[/rest]
    let username_end = after_tilde.find('/').unwrap_or(after_tilde.len());
    let username = &after_tilde[..username_end];
    let rest = after_tilde[username_end..].trim_start_matches('/');

    let user = uzers::get_user_by_name(username)?;
    Some(user.home_dir().join(rest))
}
