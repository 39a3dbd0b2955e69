/*++

Licensed under the Apache-2.0 license.

File Name:

    wait.rs

Abstract:

    File contains helper functions for polling hardware status

--*/

use ipecc_error::{IpeccError, IpeccResult};

/// Spins until `predicate` holds.
pub fn until<F>(mut predicate: F)
where
    F: FnMut() -> bool,
{
    while !predicate() {}
}

/// Spins until `predicate` holds. With a `limit`, the predicate is
/// evaluated at most `limit` times.
///
/// # Errors
///
/// * `DRIVER_IPECC_DEVICE_UNRESPONSIVE` - `limit` evaluations all failed
pub fn until_bounded<F>(limit: Option<u32>, mut predicate: F) -> IpeccResult<()>
where
    F: FnMut() -> bool,
{
    let Some(limit) = limit else {
        until(predicate);
        return Ok(());
    };
    if (0..limit).any(|_| predicate()) {
        Ok(())
    } else {
        Err(IpeccError::DRIVER_IPECC_DEVICE_UNRESPONSIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until() {
        let mut polls = 0;
        until(|| {
            polls += 1;
            polls == 5
        });
        assert_eq!(polls, 5);
    }

    #[test]
    fn test_until_bounded() {
        let mut polls = 0;
        assert_eq!(
            until_bounded(Some(3), || {
                polls += 1;
                polls == 3
            }),
            Ok(())
        );

        polls = 0;
        assert_eq!(
            until_bounded(Some(3), || {
                polls += 1;
                polls == 4
            }),
            Err(IpeccError::DRIVER_IPECC_DEVICE_UNRESPONSIVE)
        );
        assert_eq!(polls, 3);

        polls = 0;
        assert_eq!(
            until_bounded(None, || {
                polls += 1;
                polls == 1000
            }),
            Ok(())
        );
    }
}
