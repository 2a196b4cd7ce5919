use std::path::{Path, PathBuf};

/// File name of the recording with the given index.
/// e.g. "angles_3.csv"
pub fn recording_file_name(base_name: &str, index: u32) -> String {
    format!("{base_name}_{index}.csv")
}

/// Full path of the recording with the given index inside `dir`.
/// e.g. "recordings/angles_3.csv"
pub fn recording_path(dir: &Path, base_name: &str, index: u32) -> PathBuf {
    dir.join(recording_file_name(base_name, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_format() {
        assert_eq!(recording_file_name("angles", 0), "angles_0.csv");
        assert_eq!(recording_file_name("take", 17), "take_17.csv");

        let p = recording_path(Path::new("recordings"), "angles", 3);
        assert_eq!(p, Path::new("recordings").join("angles_3.csv"));
    }
}
