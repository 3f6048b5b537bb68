//! Fallible allocation for the worst-case sized buffers of the meshlet
//! builder. Scratch vectors are plain owned `Vec`s, so every early return
//! releases them.

use bytemuck::Zeroable;

use crate::error::MeshError;

pub(crate) fn try_zeroed<T: Zeroable + Clone>(
    buffer: &'static str,
    len: usize,
) -> Result<Vec<T>, MeshError> {
    let mut result = Vec::new();
    result
        .try_reserve_exact(len)
        .map_err(|source| MeshError::OutOfMemory {
            buffer,
            len,
            source,
        })?;
    result.resize(len, T::zeroed());
    Ok(result)
}

/// Moves the first `len` elements of `scratch` into an exactly sized buffer
/// and frees the scratch.
pub(crate) fn try_shrink<T: Copy>(
    buffer: &'static str,
    scratch: Vec<T>,
    len: usize,
) -> Result<Vec<T>, MeshError> {
    let len = len.min(scratch.len());
    let mut result = Vec::new();
    result
        .try_reserve_exact(len)
        .map_err(|source| MeshError::OutOfMemory {
            buffer,
            len,
            source,
        })?;
    result.extend_from_slice(&scratch[..len]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_shrink() {
        let scratch: Vec<u32> = try_zeroed("scratch", 64).unwrap();
        let shrunk = try_shrink("scratch", scratch, 10).unwrap();
        assert_eq!(shrunk.len(), 10);
        assert_eq!(shrunk.capacity(), 10);
    }

    #[test]
    fn test_impossible_allocation() {
        let result = try_zeroed::<u32>("meshlet vertices", usize::MAX);
        assert!(matches!(
            result,
            Err(MeshError::OutOfMemory {
                buffer: "meshlet vertices",
                len: usize::MAX,
                ..
            })
        ));
    }
}
