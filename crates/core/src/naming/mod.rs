//! Move naming convention.
//!
//! Library moves are named `<short>_<song>` with an optional trailing `_sm`
//! marker (`<short>_<song>_sm`), and editor exports may append a `.move`
//! extension. Practice data refers to moves by their short name, with the
//! owning song tracked separately, so the two directions live here.

/// Extension appended to move names by editor exports.
pub const MOVE_EXTENSION: &str = ".move";

/// Marker kept at the end of both short and qualified names.
pub const SM_MARKER: &str = "_sm";

pub fn strip_extension(name: &str) -> &str {
    name.strip_suffix(MOVE_EXTENSION).unwrap_or(name)
}

/// Canonical short name: extension and `_<song>` suffix removed, `_sm`
/// marker preserved.
pub fn short_name(name: &str, song: &str) -> String {
    let base = strip_extension(name);
    let (stem, marker) = match base.strip_suffix(SM_MARKER) {
        Some(stem) => (stem, SM_MARKER),
        None => (base, ""),
    };

    let song_suffix = format!("_{song}");
    let stem = if song.is_empty() {
        stem
    } else {
        stem.strip_suffix(song_suffix.as_str()).unwrap_or(stem)
    };

    format!("{stem}{marker}")
}

/// Inverse of [`short_name`] for a move owned by `song`.
pub fn qualified_name(short: &str, song: &str) -> String {
    if song.is_empty() {
        return short.to_string();
    }
    match short.strip_suffix(SM_MARKER) {
        Some(stem) => format!("{stem}_{song}{SM_MARKER}"),
        None => format!("{short}_{song}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_extension_and_song_suffix() {
        assert_eq!(short_name("arms_up_gonow.move", "gonow"), "arms_up");
        assert_eq!(short_name("arms_up_gonow", "gonow"), "arms_up");
    }

    #[test]
    fn preserves_sm_marker() {
        assert_eq!(short_name("arms_up_gonow_sm.move", "gonow"), "arms_up_sm");
        assert_eq!(qualified_name("arms_up_sm", "gonow"), "arms_up_gonow_sm");
    }

    #[test]
    fn leaves_foreign_names_alone() {
        assert_eq!(short_name("arms_up_other", "gonow"), "arms_up_other");
        assert_eq!(short_name("arms_up", ""), "arms_up");
    }

    #[test]
    fn qualified_name_inverts_short_name() {
        for name in ["clap_gonow", "clap_gonow_sm", "big_step_left_gonow"] {
            let short = short_name(name, "gonow");
            assert_eq!(qualified_name(&short, "gonow"), name);
        }
    }
}
