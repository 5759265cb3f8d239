//! Definitions for tracking source positions of kernel programs. Blocks
//! carry a position as their sequence point so that lowering failures can
//! name the offending source line.

use std::sync::LazyLock;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// Handle to a position in a [PositionTable].
pub struct PosIdx(u32);

#[derive(Clone, Copy, PartialEq, Eq)]
/// Handle to a file in a [PositionTable].
pub struct FileIdx(u32);

/// A source program file.
struct File {
    /// Name of the file
    name: Box<str>,
    /// The source code of the file
    source: Box<str>,
}

struct PosData {
    /// The file the span comes from.
    file: FileIdx,
    /// Start of the span
    start: usize,
    /// End of the span
    end: usize,
}

/// Append-only source position information. Positions are only ever added,
/// so the table hands out stable copyable indices.
struct PositionTable {
    /// The source files of the program
    files: boxcar::Vec<File>,
    /// Mapping from indices to position data
    indices: boxcar::Vec<PosData>,
}

impl PositionTable {
    /// The unknown position
    pub const UNKNOWN: PosIdx = PosIdx(0);

    /// Create a new position table where the first file and first position
    /// are unknown.
    pub fn new() -> Self {
        let table = PositionTable {
            files: boxcar::Vec::new(),
            indices: boxcar::Vec::new(),
        };
        table.add_file("unknown".to_string(), "".to_string());
        let pos = table.add_pos(FileIdx(0), 0, 0);
        debug_assert!(pos == Self::UNKNOWN);
        table
    }

    /// Add a new file to the position table
    pub fn add_file(&self, name: String, source: String) -> FileIdx {
        let file = File {
            name: name.into(),
            source: source.into(),
        };
        let file_idx = self.files.push(file);
        FileIdx(file_idx as u32)
    }

    fn get_file_data(&self, file: FileIdx) -> &File {
        &self.files[file.0 as usize]
    }

    /// Add a new position to the position table
    pub fn add_pos(&self, file: FileIdx, start: usize, end: usize) -> PosIdx {
        let pos = PosData { file, start, end };
        let pos_idx = self.indices.push(pos);
        PosIdx(pos_idx as u32)
    }

    fn get_pos(&self, pos: PosIdx) -> &PosData {
        &self.indices[pos.0 as usize]
    }
}

static GPOS_TABLE: LazyLock<PositionTable> = LazyLock::new(PositionTable::new);

/// The global position table.
pub struct GlobalPositionTable;

impl GlobalPositionTable {
    pub fn add_file(name: String, source: String) -> FileIdx {
        GPOS_TABLE.add_file(name, source)
    }

    pub fn add_pos(file: FileIdx, start: usize, end: usize) -> PosIdx {
        GPOS_TABLE.add_pos(file, start, end)
    }

    pub fn get_source(file: FileIdx) -> &'static str {
        &GPOS_TABLE.get_file_data(file).source
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// A position index backed by the global [PositionTable].
pub struct GPosIdx(pub PosIdx);

impl GPosIdx {
    /// The sentinel for values without source information.
    pub const UNKNOWN: GPosIdx = GPosIdx(PositionTable::UNKNOWN);

    /// Render `file:line` for the position, counting lines from 1.
    pub fn format_location(&self) -> String {
        if *self == Self::UNKNOWN {
            return "unknown".to_string();
        }
        let pos = GPOS_TABLE.get_pos(self.0);
        let file = GPOS_TABLE.get_file_data(pos.file);
        let line = file.source[..pos.start.min(file.source.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count()
            + 1;
        format!("{}:{}", file.name, line)
    }
}

impl Default for GPosIdx {
    fn default() -> Self {
        Self::UNKNOWN
    }
}
