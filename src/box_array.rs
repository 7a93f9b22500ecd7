//! Fixed-size arrays allocated on the heap. `Box::new([0u8; N])` builds the
//! array on the stack before moving it, which blows up for ROM-sized buffers.

use std::convert::TryInto;
use std::ops::{Deref, DerefMut};

pub struct BoxArray<T, const N: usize>(Box<[T; N]>);

impl<T: Clone, const N: usize> BoxArray<T, N> {
    /// Allocate an array with every element set to `v`
    pub fn from_elem(v: T) -> BoxArray<T, N> {
        let slice = vec![v; N].into_boxed_slice();

        match slice.try_into() {
            Ok(array) => BoxArray(array),
            Err(_) => unreachable!("vec![v; N] always has N elements"),
        }
    }
}

impl<T, const N: usize> Deref for BoxArray<T, N> {
    type Target = [T; N];

    fn deref(&self) -> &[T; N] {
        &self.0
    }
}

impl<T, const N: usize> DerefMut for BoxArray<T, N> {
    fn deref_mut(&mut self) -> &mut [T; N] {
        &mut self.0
    }
}

#[test]
fn from_elem_fills() {
    let mut a = BoxArray::<u8, 16>::from_elem(0xca);

    assert!(a.iter().all(|&b| b == 0xca));

    a[15] = 1;
    assert_eq!(a[15], 1);
}
