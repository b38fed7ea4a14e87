use rand::Rng;
use std::fs;
use tempfile::tempdir;
use tern::app::history::{HISTORY_LIMIT, History};

#[test]
fn load_skips_malformed_lines() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("history");
    fs::write(&path, ": set hidden\n$ ls -l\nbogus line\n% make test\n")?;

    let mut h = History::new(path);
    h.load()?;
    assert_eq!(h.entries().len(), 3);
    assert_eq!(h.begin(), 3);
    assert_eq!(h.entries()[1].prefix, '$');
    assert_eq!(h.entries()[1].value, "ls -l");
    Ok(())
}

#[test]
fn missing_file_is_empty_history() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut h = History::new(dir.path().join("none"));
    h.load()?;
    assert!(h.entries().is_empty());
    Ok(())
}

#[test]
fn persist_merges_with_other_instances() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("history");
    fs::write(&path, ": one\n")?;

    let mut first = History::new(path.clone());
    let mut second = History::new(path.clone());
    first.load()?;
    second.load()?;

    first.record('$', "from first");
    second.record('!', "from second");
    first.persist()?;
    second.persist()?;

    assert_eq!(
        fs::read_to_string(&path)?,
        ": one\n$ from first\n! from second\n"
    );
    Ok(())
}

#[test]
fn persist_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("history");

    let mut h = History::new(path.clone());
    h.load()?;
    h.record(':', "cd /tmp");
    h.record('&', "sleep 1");
    h.persist()?;
    let once = fs::read_to_string(&path)?;
    h.persist()?;
    assert_eq!(fs::read_to_string(&path)?, once);
    assert_eq!(once.lines().count(), 2);
    Ok(())
}

#[test]
fn persist_keeps_newest_entries() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("history");
    let mut rng = rand::rng();

    let old: String = (0..HISTORY_LIMIT)
        .map(|i| format!(": old {i}\n"))
        .collect();
    fs::write(&path, old)?;

    let mut h = History::new(path.clone());
    h.load()?;
    let extra = rng.random_range(1..50);
    for i in 0..extra {
        h.record('$', &format!("new {i}"));
    }
    h.persist()?;

    let content = fs::read_to_string(&path)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), HISTORY_LIMIT);
    assert_eq!(lines[0], format!(": old {extra}"));
    assert_eq!(lines[HISTORY_LIMIT - 1], format!("$ new {}", extra - 1));
    Ok(())
}
