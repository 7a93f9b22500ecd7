//! PS-X EXE executables

use super::Addressable;
use crate::error::{PsxError, Result};
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 8] = b"PS-X EXE";

/// The text starts right after the header
const HEADER_SIZE: usize = 0x800;

pub struct Exe {
    /// Entry point
    pc: u32,
    /// Initial value of the global pointer ($28)
    gp: u32,
    /// RAM address the text is copied to
    load_addr: u32,
    /// Initial stack pointer, 0 means "keep the BIOS one"
    stack_base: u32,
    stack_offset: u32,
    text: Vec<u8>,
}

impl Exe {
    pub fn from_bytes(binary: &[u8]) -> Result<Exe> {
        if binary.len() < HEADER_SIZE {
            return Err(PsxError::BadExe(format!(
                "file is only {} bytes long",
                binary.len()
            )));
        }

        if &binary[..MAGIC.len()] != MAGIC {
            return Err(PsxError::BadExe("missing PS-X EXE magic".to_string()));
        }

        let word = |offset: usize| u32::load(&binary[offset..]);

        let text_size = word(0x1c) as usize;

        let text = match binary.get(HEADER_SIZE..HEADER_SIZE + text_size) {
            Some(t) => t.to_vec(),
            None => {
                return Err(PsxError::BadExe(format!(
                    "text is {} bytes long but the file only contains {}",
                    text_size,
                    binary.len() - HEADER_SIZE
                )))
            }
        };

        Ok(Exe {
            pc: word(0x10),
            gp: word(0x14),
            load_addr: word(0x18),
            stack_base: word(0x30),
            stack_offset: word(0x34),
            text,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Exe> {
        let binary = fs::read(path)?;

        Exe::from_bytes(&binary)
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn gp(&self) -> u32 {
        self.gp
    }

    pub fn load_addr(&self) -> u32 {
        self.load_addr
    }

    /// Initial stack pointer, if the executable sets one
    pub fn stack(&self) -> Option<u32> {
        match self.stack_base {
            0 => None,
            base => Some(base.wrapping_add(self.stack_offset)),
        }
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }
}

#[cfg(test)]
pub(crate) fn build_exe(pc: u32, load_addr: u32, stack: u32, text: &[u8]) -> Vec<u8> {
    let mut exe = vec![0; HEADER_SIZE];

    exe[..8].copy_from_slice(MAGIC);
    pc.store(&mut exe[0x10..]);
    0x8001_0000u32.store(&mut exe[0x14..]);
    load_addr.store(&mut exe[0x18..]);
    (text.len() as u32).store(&mut exe[0x1c..]);
    stack.store(&mut exe[0x30..]);

    exe.extend_from_slice(text);

    exe
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_header() {
        let exe = Exe::from_bytes(&build_exe(0x8001_0000, 0x8001_0000, 0x801f_fff0, &[1, 2, 3, 4]))
            .unwrap();

        assert_eq!(exe.pc(), 0x8001_0000);
        assert_eq!(exe.gp(), 0x8001_0000);
        assert_eq!(exe.load_addr(), 0x8001_0000);
        assert_eq!(exe.stack(), Some(0x801f_fff0));
        assert_eq!(exe.text(), &[1, 2, 3, 4]);
    }

    #[test]
    fn bad_images() {
        assert!(matches!(
            Exe::from_bytes(&[0; 16]),
            Err(PsxError::BadExe(_))
        ));

        let mut exe = build_exe(0, 0, 0, &[0; 8]);
        exe[0] = b'X';
        assert!(matches!(Exe::from_bytes(&exe), Err(PsxError::BadExe(_))));

        // Truncated text
        let mut exe = build_exe(0, 0, 0, &[0; 8]);
        exe.truncate(HEADER_SIZE + 4);
        assert!(matches!(Exe::from_bytes(&exe), Err(PsxError::BadExe(_))));
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&build_exe(0x8001_0000, 0x8001_0000, 0, &[0xaa; 16]))
            .unwrap();

        let exe = Exe::from_file(file.path()).unwrap();

        assert_eq!(exe.text().len(), 16);
        assert_eq!(exe.stack(), None);
    }
}
