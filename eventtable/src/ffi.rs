//! C entry points for host runtimes that load the library dynamically.
//!
//! Scalars are passed by pointer, the way `.C()`-style foreign calls hand
//! every argument over as a one-element array.

use std::{os::raw::c_int, slice};

use crate::{aggregate::convert, error::AggregateError};

/// Status returned by [`eventtable_aggregate`] for a null buffer.
pub const STATUS_NULL_POINTER: c_int = -1;

/// Aggregates `*n` events into at most `*m` buckets, in place.
///
/// Non-positive `*n` or `*m` returns without touching any buffer. Input that
/// would need more than `*m` buckets, or whose running total overflows, is
/// rejected as a whole: nothing is written and a warning is logged. `t_list`
/// may be null; otherwise it receives the timestamp of each written bucket.
///
/// # Safety
///
/// `event_list_t` and `event_list_action` must be valid for `*n` elements,
/// `num_list` and a non-null `t_list` for `*m` elements, and none of them may
/// overlap.
#[no_mangle]
pub unsafe extern "C" fn convert_event_table(
    event_list_t: *const f64,
    event_list_action: *mut c_int,
    n: *const c_int,
    t_list: *mut f64,
    num_list: *mut c_int,
    m: *const c_int,
) {
    if let Err(error) = run(event_list_t, event_list_action, n, t_list, num_list, m, false) {
        tracing::warn!(%error, "convert_event_table: input rejected");
    }
}

/// Checked variant of [`convert_event_table`]: timestamps must be sorted and
/// the outcome is returned instead of logged.
///
/// Returns the number of buckets written, or a negative status:
/// `-1` null pointer, `-2` too many distinct timestamps, `-3` unsorted input,
/// `-4` running total overflow. Both buffers are sized from the same `*n`, so
/// the length mismatch (`-5`) and invalid session (`-6`) codes of
/// [`AggregateError::code`] never come from this entry point.
///
/// # Safety
///
/// Same requirements as [`convert_event_table`].
#[no_mangle]
pub unsafe extern "C" fn eventtable_aggregate(
    event_list_t: *const f64,
    event_list_action: *mut c_int,
    n: *const c_int,
    t_list: *mut f64,
    num_list: *mut c_int,
    m: *const c_int,
) -> c_int {
    match run(event_list_t, event_list_action, n, t_list, num_list, m, true) {
        Ok(written) => written as c_int,
        Err(Rejected::NullPointer) => STATUS_NULL_POINTER,
        Err(Rejected::Input(e)) => {
            tracing::warn!(error = %e, "eventtable_aggregate: input rejected");
            e.code()
        }
    }
}

#[derive(Debug)]
enum Rejected {
    NullPointer,
    Input(AggregateError),
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejected::NullPointer => write!(f, "null buffer"),
            Rejected::Input(e) => e.fmt(f),
        }
    }
}

unsafe fn run(
    event_list_t: *const f64,
    event_list_action: *mut c_int,
    n: *const c_int,
    t_list: *mut f64,
    num_list: *mut c_int,
    m: *const c_int,
    strict: bool,
) -> Result<usize, Rejected> {
    if n.is_null() || m.is_null() {
        return Err(Rejected::NullPointer);
    }
    let (n, m) = (*n, *m);
    if n <= 0 || m <= 0 {
        return Ok(0);
    }
    if event_list_t.is_null() || event_list_action.is_null() || num_list.is_null() {
        return Err(Rejected::NullPointer);
    }
    let (n, m) = (n as usize, m as usize);
    let times = slice::from_raw_parts(event_list_t, n);
    let actions = slice::from_raw_parts_mut(event_list_action, n);
    let buckets = slice::from_raw_parts_mut(num_list, m);
    let bucket_times = (!t_list.is_null()).then(|| slice::from_raw_parts_mut(t_list, m));
    convert(times, actions, buckets, bucket_times, strict).map_err(Rejected::Input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_convert_event_table() {
        let times = [1.0, 1.0, 2.0, 3.0, 3.0];
        let mut actions = [2, -1, 4, 0, 1];
        let mut t_list = [0.0; 3];
        let mut num_list = [0; 3];
        unsafe {
            convert_event_table(
                times.as_ptr(),
                actions.as_mut_ptr(),
                &5,
                t_list.as_mut_ptr(),
                num_list.as_mut_ptr(),
                &3,
            );
        }
        assert_eq!(actions, [2, 1, 5, 5, 6]);
        assert_eq!(num_list, [2, 5, 6]);
        assert_eq!(t_list, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_non_positive_lengths() {
        let times = [1.0, 2.0];
        let mut actions = [1, 1];
        let mut num_list = [7, 7];
        unsafe {
            convert_event_table(
                times.as_ptr(),
                actions.as_mut_ptr(),
                &0,
                ptr::null_mut(),
                num_list.as_mut_ptr(),
                &2,
            );
            convert_event_table(
                times.as_ptr(),
                actions.as_mut_ptr(),
                &2,
                ptr::null_mut(),
                num_list.as_mut_ptr(),
                &-1,
            );
        }
        assert_eq!(actions, [1, 1]);
        assert_eq!(num_list, [7, 7]);
    }

    #[test]
    fn test_overflowing_output_is_rejected() {
        let times = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut actions = [1; 5];
        // the slot past the declared capacity must survive
        let mut num_list = [0, 0, 42];
        unsafe {
            convert_event_table(
                times.as_ptr(),
                actions.as_mut_ptr(),
                &5,
                ptr::null_mut(),
                num_list.as_mut_ptr(),
                &2,
            );
        }
        assert_eq!(actions, [1; 5]);
        assert_eq!(num_list, [0, 0, 42]);
    }

    #[test]
    fn test_eventtable_aggregate_status() {
        let mut actions = [1, 1, 1];
        let mut num_list = [0; 3];
        let status = unsafe {
            eventtable_aggregate(
                [1.0, 2.0, 2.0].as_ptr(),
                actions.as_mut_ptr(),
                &3,
                ptr::null_mut(),
                num_list.as_mut_ptr(),
                &3,
            )
        };
        assert_eq!(status, 2);
        assert_eq!(num_list, [1, 3, 0]);

        let mut actions = [1, 1];
        let status = unsafe {
            eventtable_aggregate(
                [2.0, 1.0].as_ptr(),
                actions.as_mut_ptr(),
                &2,
                ptr::null_mut(),
                num_list.as_mut_ptr(),
                &3,
            )
        };
        assert_eq!(status, -3);

        let status = unsafe {
            eventtable_aggregate(
                [1.0, 2.0].as_ptr(),
                actions.as_mut_ptr(),
                &2,
                ptr::null_mut(),
                num_list.as_mut_ptr(),
                &1,
            )
        };
        assert_eq!(status, -2);

        let status = unsafe {
            eventtable_aggregate(
                ptr::null(),
                actions.as_mut_ptr(),
                &2,
                ptr::null_mut(),
                num_list.as_mut_ptr(),
                &1,
            )
        };
        assert_eq!(status, STATUS_NULL_POINTER);
    }
}
