use std::io::{self, prelude::*};

/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Rank of `rank` when the group is renumbered to start at `origin`.
pub fn relative_rank(rank: usize, origin: usize, size: usize) -> usize {
    (rank + size - origin) % size
}

/// Inverse of [relative_rank].
pub fn absolute_rank(relative: usize, origin: usize, size: usize) -> usize {
    (relative + origin) % size
}

/// Next rank around the ring.
pub fn successor(rank: usize, size: usize) -> usize {
    (rank + 1) % size
}

/// Previous rank around the ring.
pub fn predecessor(rank: usize, size: usize) -> usize {
    (rank + size - 1) % size
}

/// Read a usize out of the given stream.
///
pub fn read_usize<R: Read>(stream: &mut R) -> io::Result<usize> {
    Ok(usize::from_le_bytes(read_bytes_array(stream)?))
}

/// Read the given number of bytes from a stream, into a vec.
///
pub fn read_bytes_vec<R: Read>(stream: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0; size];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Read the given (const) number of bytes from a stream, into an array.
///
pub fn read_bytes_array<R: Read, const SIZE: usize>(stream: &mut R) -> io::Result<[u8; SIZE]> {
    let mut buffer = [0; SIZE];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}
