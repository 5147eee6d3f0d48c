pub const TREEVIEW_DISPLAY_VERSION: &str = env!("TREEVIEW_DISPLAY_VERSION");
pub const TREEVIEW_BUILD_N: &str = env!("TREEVIEW_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "treeview {}\nBuild {}\nLineage tree layout and navigation for cell tracking",
        TREEVIEW_DISPLAY_VERSION, TREEVIEW_BUILD_N
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_text() {
        let text = version_cli_text();
        assert!(text.starts_with("treeview "));
        assert!(text.contains(TREEVIEW_BUILD_N));
    }
}
