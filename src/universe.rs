//! Loading the set of ids a run should cover

use std::collections::HashSet;
use std::path::Path;

use crate::item::ItemId;

/// Parse one id per line. Blank lines and `#` comments are skipped,
/// duplicates keep their first position.
pub fn parse_universe(text: &str) -> Vec<ItemId> {
    let mut seen = HashSet::new();
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(ItemId::from)
        .collect()
}

/// Read a universe file from disk
pub async fn load_universe(path: impl AsRef<Path>) -> std::io::Result<Vec<ItemId>> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    let universe = parse_universe(&text);
    tracing::info!(
        path = %path.as_ref().display(),
        items = universe.len(),
        "Universe loaded"
    );
    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_skips_comments_and_duplicates() {
        let text = "# filtered paid games\n570\n\n730  # cs\n570\n  440 \n";
        let universe = parse_universe(text);
        assert_eq!(
            universe,
            vec![ItemId::from("570"), ItemId::from("730"), ItemId::from("440")]
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_universe("\n# nothing\n").is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ids.txt");
        std::fs::write(&path, "1\n2\n3\n").unwrap();

        let universe = load_universe(&path).await.unwrap();
        assert_eq!(universe.len(), 3);
    }
}
