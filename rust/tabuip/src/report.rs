use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write any serializable report (`incumbent.json`, `status.json`,
/// `feasible.json`) as pretty-printed JSON.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}
