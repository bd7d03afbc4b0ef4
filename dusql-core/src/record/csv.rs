use std::io::{self, Write};

use super::{InventoryRecord, lossy_text};

/// Writes records as CSV lines in inventory field order
///
/// Columns: inode, device, parent_inode, mode, uid, gid, size, mtime,
/// scan_time, basename, root_device, ancestor_inode. Null fields are empty
/// cells. No header row is written.
pub struct RecordWriter<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write(&mut self, rec: &InventoryRecord) -> io::Result<()> {
        let mut line = String::with_capacity(96 + rec.basename.len());
        line.push_str(&rec.inode.to_string());
        line.push(',');
        line.push_str(&rec.device.to_string());
        line.push(',');
        push_opt(&mut line, rec.parent_inode);
        line.push(',');
        push_opt(&mut line, rec.mode);
        line.push(',');
        push_opt(&mut line, rec.uid);
        line.push(',');
        push_opt(&mut line, rec.gid);
        line.push(',');
        push_opt(&mut line, rec.size);
        line.push(',');
        push_opt(&mut line, rec.mtime);
        line.push(',');
        line.push_str(&rec.scan_time.to_string());
        line.push(',');
        push_text(&mut line, &lossy_text(&rec.basename));
        line.push(',');
        line.push_str(&rec.root_device.to_string());
        line.push(',');
        push_opt(&mut line, rec.ancestor_inode);
        line.push_str("\r\n");

        self.out.write_all(line.as_bytes())?;
        self.written += 1;
        Ok(())
    }

    pub fn write_all<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a InventoryRecord>,
    ) -> io::Result<()> {
        for rec in records {
            self.write(rec)?;
        }
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn push_opt<T: ToString>(line: &mut String, value: Option<T>) {
    if let Some(v) = value {
        line.push_str(&v.to_string());
    }
}

/// Quote a text cell if it contains a delimiter, quote or line break
fn push_text(line: &mut String, text: &str) {
    if text.contains([',', '"', '\r', '\n']) {
        line.push('"');
        line.push_str(&text.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(text);
    }
}
