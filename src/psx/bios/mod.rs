use super::memory_map::BIOS_SIZE;
use super::Addressable;
use crate::box_array::BoxArray;
use crate::error::{PsxError, Result};
use std::fs;
use std::path::Path;

pub struct Bios {
    rom: BoxArray<u8, BIOS_SIZE>,
}

impl Bios {
    /// Build a BIOS image from `binary`. Images larger than the ROM region are
    /// rejected, smaller ones are padded with zeroes.
    pub fn new(binary: &[u8]) -> Result<Bios> {
        if binary.is_empty() {
            return Err(PsxError::BadBios("empty image".to_string()));
        }

        if binary.len() > BIOS_SIZE {
            return Err(PsxError::BadBios(format!(
                "image is {} bytes, the ROM is only {} bytes",
                binary.len(),
                BIOS_SIZE
            )));
        }

        if binary.len() != BIOS_SIZE {
            warn!(
                "BIOS image is only {} bytes long, padding with zeroes",
                binary.len()
            );
        }

        let mut rom = BoxArray::from_elem(0);
        rom[..binary.len()].copy_from_slice(binary);

        Ok(Bios { rom })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Bios> {
        let binary = fs::read(path)?;

        Bios::new(&binary)
    }

    /// Creates a BIOS instance with content set to all 0s.
    pub fn new_dummy() -> Bios {
        Bios {
            rom: BoxArray::from_elem(0),
        }
    }

    pub fn load<T: Addressable>(&self, offset: u32) -> T {
        let offset = offset as usize & (BIOS_SIZE - 1);

        T::load(&self.rom[offset..])
    }

    /// Return the raw BIOS ROM
    pub fn get_rom(&self) -> &[u8; BIOS_SIZE] {
        &self.rom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn oversized_image_is_rejected() {
        let binary = vec![0u8; BIOS_SIZE + 1];

        match Bios::new(&binary) {
            Err(PsxError::BadBios(_)) => (),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("oversized BIOS accepted"),
        }
    }

    #[test]
    fn short_image_is_padded() {
        let bios = Bios::new(&[0x78, 0x56, 0x34, 0x12, 0xff]).unwrap();

        assert_eq!(bios.load::<u32>(0), 0x1234_5678);
        assert_eq!(bios.load::<u8>(4), 0xff);
        assert_eq!(bios.load::<u32>(8), 0);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut binary = vec![0u8; BIOS_SIZE];
        binary[BIOS_SIZE - 2] = 0xab;
        binary[BIOS_SIZE - 1] = 0xcd;
        file.write_all(&binary).unwrap();

        let bios = Bios::from_file(file.path()).unwrap();

        assert_eq!(bios.load::<u16>((BIOS_SIZE - 2) as u32), 0xcdab);
        assert_eq!(bios.get_rom().len(), BIOS_SIZE);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();

        match Bios::from_file(dir.path().join("nope.bin")) {
            Err(PsxError::IoError(_)) => (),
            _ => panic!("expected an I/O error"),
        }
    }
}
