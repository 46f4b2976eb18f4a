//! Log Listing and Tailing
//!
//! Serves log files from a single directory: listing with substring filters, grouping by
//! category and reading the last lines of a file.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bytes read per step when scanning a file backwards
const TAIL_BLOCK_SIZE: u64 = 4096;

/// Keep the file names that contain every non-empty filter as a substring
pub fn filter_log_files<S: AsRef<str>>(files: &[String], filters: &[S]) -> Vec<String> {
    let filters: Vec<&str> = filters
        .iter()
        .map(|f| f.as_ref().trim())
        .filter(|f| !f.is_empty())
        .collect();

    files
        .iter()
        .filter(|name| filters.iter().all(|f| name.contains(f)))
        .cloned()
        .collect()
}

/// Category for files that match no other category
pub const MISC_CATEGORY: &str = "misc";

/// Log categories in index order; a file may fall into several of them
const LOG_CATEGORIES: &[&str] = &[
    "worker_errors",
    "worker_outs",
    "python_core_worker_logs",
    "python_driver_logs",
    "java_core_worker_logs",
    "java_driver_logs",
    "cpp_core_worker_logs",
    "cpp_driver_logs",
    "dashboard",
    "raylet",
    "gcs_server",
    "ray_client",
    "autoscaler",
    "runtime_env",
];

fn in_category(category: &str, file: &str) -> bool {
    let log = file.ends_with(".log");
    match category {
        "worker_errors" => file.contains("worker") && file.ends_with(".err"),
        "worker_outs" => file.contains("worker") && file.ends_with(".out"),
        "python_core_worker_logs" => log && file.contains("python-core-worker"),
        "python_driver_logs" => log && file.contains("python-core-driver"),
        "java_core_worker_logs" => log && file.contains("java-core-worker"),
        "java_driver_logs" => log && file.contains("java-core-driver"),
        "cpp_core_worker_logs" => log && file.contains("cpp-core-worker"),
        "cpp_driver_logs" => log && file.contains("cpp-core-driver"),
        "dashboard" => file.contains("dashboard"),
        "raylet" => file.contains("raylet"),
        "gcs_server" => file.contains("gcs"),
        "ray_client" => file.contains("ray_client"),
        "autoscaler" => file.contains("monitor") && !file.contains("log_monitor"),
        "runtime_env" => file.contains("runtime_env"),
        _ => false,
    }
}

/// Group file names by the component that wrote them.
///
/// Only non-empty categories are returned. Files that fit no category land in
/// [`MISC_CATEGORY`].
pub fn categorize_log_files(files: &[String]) -> BTreeMap<&'static str, Vec<String>> {
    let mut index: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();

    for file in files {
        let mut matched = false;
        for &category in LOG_CATEGORIES {
            if in_category(category, file) {
                index.entry(category).or_default().push(file.clone());
                matched = true;
            }
        }
        if !matched {
            index.entry(MISC_CATEGORY).or_default().push(file.clone());
        }
    }

    index
}

/// Read the last `lines` lines of a seekable reader.
///
/// Returns those lines joined by `\n` without a trailing terminator, and the end offset of
/// the reader (its total length). A final line without a trailing newline still counts.
pub fn tail<R: Read + Seek>(reader: &mut R, lines: usize) -> std::io::Result<(Vec<u8>, u64)> {
    let end = reader.seek(SeekFrom::End(0))?;
    if lines == 0 || end == 0 {
        return Ok((Vec::new(), end));
    }

    let mut blocks: Vec<Vec<u8>> = Vec::new();
    let mut newlines = 0usize;
    let mut needed = lines;
    let mut pos = end;

    // Only the newly read block is scanned on each step.
    while pos > 0 && newlines < needed {
        let step = TAIL_BLOCK_SIZE.min(pos);
        pos -= step;

        reader.seek(SeekFrom::Start(pos))?;
        let mut block = vec![0u8; step as usize];
        reader.read_exact(&mut block)?;

        // A newline at the very end terminates the last line instead of separating two.
        if blocks.is_empty() && block.last() == Some(&b'\n') {
            needed += 1;
        }
        newlines += block.iter().filter(|b| **b == b'\n').count();
        blocks.push(block);
    }

    blocks.reverse();
    let text = blocks.concat();
    let body = text.strip_suffix(b"\n").unwrap_or(&text[..]);

    let mut last: Vec<&[u8]> = body.rsplit(|b| *b == b'\n').take(lines).collect();
    last.reverse();

    Ok((last.join(&b'\n'), end))
}

/// Log files in one directory
#[derive(Debug, Clone)]
pub struct LogSource {
    dir: PathBuf,
}

impl LogSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Names of the regular files in the directory, sorted
    pub fn list_files(&self) -> Result<Vec<String>, LogError> {
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| LogError::Io(self.dir.clone(), e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LogError::Io(self.dir.clone(), e))?;
            let path = entry.path();

            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        debug!(dir = %self.dir.display(), count = files.len(), "Listed log files");
        Ok(files)
    }

    /// Last `lines` lines of the named file and the file length
    pub fn tail_file(&self, name: &str, lines: usize) -> Result<(Vec<u8>, u64), LogError> {
        let path = self.resolve(name)?;
        let mut file = std::fs::File::open(&path).map_err(|e| LogError::Io(path.clone(), e))?;
        tail(&mut file, lines).map_err(|e| LogError::Io(path, e))
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, LogError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\');

        if !plain {
            return Err(LogError::InvalidFileName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

/// Log errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("No log directory configured")]
    NotConfigured,

    #[error("Invalid log file name: {0}")]
    InvalidFileName(String),

    #[error("IO error accessing {0:?}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Log task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    /// Reader that records how many bytes were read through it
    struct CountingReader {
        inner: Cursor<Vec<u8>>,
        bytes_read: usize,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.bytes_read += n;
            Ok(n)
        }
    }

    impl Seek for CountingReader {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    /// `count` lines of `width` bytes each (newline included)
    fn long_lines(count: usize, width: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(count * width);
        for i in 0..count {
            let fill = b'a' + (i % 26) as u8;
            data.extend(std::iter::repeat(fill).take(width - 1));
            data.push(b'\n');
        }
        data
    }

    #[test]
    fn test_tail_large_file() {
        const TOTAL_LINES: usize = 1000;

        let mut file = tempfile::tempfile().unwrap();
        for i in 0..TOTAL_LINES {
            writeln!(file, "Message {:4}", i).unwrap();
        }

        let (text, byte_pos) = tail(&mut file, 100).unwrap();
        assert_eq!(byte_pos, (TOTAL_LINES * b"Message 1000\n".len()) as u64);

        let text = String::from_utf8(text).unwrap();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 100);
        assert_eq!(lines[0], "Message  900");
        assert_eq!(lines[99], "Message  999");
    }

    #[test]
    fn test_tail_megabytes_with_few_newlines() {
        const LINE_WIDTH: usize = 64 * 1024;
        const LINE_COUNT: usize = 128;

        let data = long_lines(LINE_COUNT, LINE_WIDTH);
        let started = std::time::Instant::now();
        let (text, end) = tail(&mut Cursor::new(data.clone()), 1_000_000).unwrap();

        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert_eq!(end, (LINE_COUNT * LINE_WIDTH) as u64);
        assert_eq!(text.len(), data.len() - 1);
        assert_eq!(text.iter().filter(|b| **b == b'\n').count(), LINE_COUNT - 1);
        assert_eq!(&text[..], &data[..data.len() - 1]);
    }

    #[test]
    fn test_tail_reads_only_the_needed_blocks() {
        const LINE_WIDTH: usize = 64 * 1024;

        let mut reader = CountingReader {
            inner: Cursor::new(long_lines(128, LINE_WIDTH)),
            bytes_read: 0,
        };
        let (text, _) = tail(&mut reader, 3).unwrap();

        assert_eq!(text.len(), 3 * LINE_WIDTH - 1);
        assert!(reader.bytes_read <= 4 * LINE_WIDTH + TAIL_BLOCK_SIZE as usize);
    }

    #[test]
    fn test_tail_block_boundary_on_newline() {
        // The read window starts exactly on a line boundary.
        let line = vec![b'x'; TAIL_BLOCK_SIZE as usize - 1];
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend_from_slice(&line);
            data.push(b'\n');
        }

        let (text, _) = tail(&mut Cursor::new(data), 1).unwrap();
        assert_eq!(text, line);
    }

    #[test]
    fn test_tail_more_lines_than_file() {
        let mut reader = Cursor::new(b"a\nb\nc\n".to_vec());
        let (text, end) = tail(&mut reader, 10).unwrap();
        assert_eq!(text, b"a\nb\nc");
        assert_eq!(end, 6);
    }

    #[test]
    fn test_tail_without_trailing_newline() {
        let mut reader = Cursor::new(b"first\nsecond\nthird".to_vec());
        let (text, _) = tail(&mut reader, 2).unwrap();
        assert_eq!(text, b"second\nthird");
    }

    #[test]
    fn test_tail_empty_and_zero() {
        let mut empty = Cursor::new(Vec::new());
        assert_eq!(tail(&mut empty, 5).unwrap(), (Vec::new(), 0));

        let mut reader = Cursor::new(b"x\n".to_vec());
        assert_eq!(tail(&mut reader, 0).unwrap(), (Vec::new(), 2));
    }

    #[test]
    fn test_filter_log_files() {
        let files = vec![
            "gcs_server.out".to_string(),
            "raylet.out".to_string(),
            "worker-abc-01.out".to_string(),
            "worker-abc-01.err".to_string(),
        ];

        assert_eq!(filter_log_files(&files, &["gcs"]), vec!["gcs_server.out"]);
        assert_eq!(
            filter_log_files(&files, &["worker", "out"]),
            vec!["worker-abc-01.out"]
        );
        assert_eq!(filter_log_files::<&str>(&files, &[]).len(), 4);
        assert_eq!(filter_log_files(&files, &["", " "]).len(), 4);
    }

    fn node_log_files() -> Vec<String> {
        [
            "debug_state_gcs.txt",
            "gcs_server.out",
            "gcs_server.err",
            "raylet.out",
            "raylet.err",
            "dashboard.log",
            "dashboard_agent.log",
            "worker-7f3a-01000000-1234.out",
            "worker-7f3a-01000000-1234.err",
            "python-core-worker-7f3a_1234.log",
            "monitor.log",
            "log_monitor.log",
            "events.json",
        ]
        .iter()
        .map(|f| f.to_string())
        .collect()
    }

    #[test]
    fn test_categorize_node_logs() {
        let index = categorize_log_files(&node_log_files());

        assert_eq!(
            index["gcs_server"],
            vec!["debug_state_gcs.txt", "gcs_server.out", "gcs_server.err"]
        );
        assert_eq!(index["raylet"], vec!["raylet.out", "raylet.err"]);
        assert_eq!(index["dashboard"], vec!["dashboard.log", "dashboard_agent.log"]);
        assert_eq!(index["worker_outs"].len(), 1);
        assert_eq!(index["worker_errors"].len(), 1);
        assert_eq!(index["python_core_worker_logs"].len(), 1);
        assert_eq!(index["autoscaler"], vec!["monitor.log"]);
        assert_eq!(index[MISC_CATEGORY], vec!["log_monitor.log", "events.json"]);
        assert!(!index.contains_key("java_core_worker_logs"));
    }

    #[test]
    fn test_categorize_after_filtering() {
        let files = node_log_files();

        let gcs = categorize_log_files(&filter_log_files(&files, &["gcs"]));
        assert_eq!(gcs.keys().copied().collect::<Vec<_>>(), vec!["gcs_server"]);

        let workers = categorize_log_files(&filter_log_files(&files, &["worker"]));
        assert_eq!(
            workers.keys().copied().collect::<Vec<_>>(),
            vec!["python_core_worker_logs", "worker_errors", "worker_outs"]
        );
    }

    #[test]
    fn test_log_source_rejects_paths() {
        let source = LogSource::new("/tmp");
        for name in ["../etc/passwd", "a/b", "..", ""] {
            assert!(matches!(
                source.tail_file(name, 1),
                Err(LogError::InvalidFileName(_))
            ));
        }
    }

    #[test]
    fn test_log_source_lists_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raylet.out"), "hello\n").unwrap();
        std::fs::write(dir.path().join("gcs_server.out"), "world\n").unwrap();
        std::fs::create_dir(dir.path().join("old")).unwrap();

        let source = LogSource::new(dir.path());
        assert_eq!(source.list_files().unwrap(), vec!["gcs_server.out", "raylet.out"]);

        let (text, end) = source.tail_file("raylet.out", 1).unwrap();
        assert_eq!(text, b"hello");
        assert_eq!(end, 6);
    }
}
