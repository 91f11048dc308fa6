// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Rank Kernels Module** - *Group-Aware Ordinal Ranking*
//!
//! A group-aware 1-D rank routine plus the per-column 2-D wrapper. Ranks are
//! 1-based within each group; tie resolution, rank direction, percentile
//! scaling and missing-value placement all follow the caller's options.
//! Rows labelled `-1` always rank as NaN.

use std::cmp::Ordering;

use minarrow::{Bitmask, Vec64};

use crate::errors::KernelError;
use crate::kernels::sort::group_sort_indexer;
use crate::types::{GroupValue, NaOption, TiesMethod, cell_is_na};
use crate::utils::{check_frame, check_len, check_mask};

/// Ranks a single value column within each group.
///
/// Non-missing rows are ordered by value (`ascending` flips the direction,
/// with ties kept in ascending row order either way) and assigned 1-based
/// ranks per `ties_method`. Missing rows follow `na_option`: `Keep` ranks
/// them NaN, `Top` places them before every real value, `Bottom` after.
/// With `pct`, ranks are divided by the number of ranked rows in the group
/// (distinct count for `Dense`).
pub fn rank_1d<T>(
    out: &mut [f64],
    values: &[T],
    labels: &[i64],
    ngroups: usize,
    is_datetimelike: bool,
    ties_method: TiesMethod,
    ascending: bool,
    pct: bool,
    na_option: NaOption,
    mask: Option<&Bitmask>,
) -> Result<(), KernelError>
where
    T: GroupValue + PartialOrd,
{
    let fname = "rank_1d";
    let n = check_frame(fname, values.len(), 1, labels.len())?;
    check_len(fname, out.len(), n)?;
    check_mask(fname, mask, n)?;

    let (indexer, sizes) = group_sort_indexer(labels, ngroups);

    // rows excluded from grouping rank as missing
    let na_block = sizes[0] as usize;
    for &row in indexer[..na_block].iter() {
        out[row as usize] = f64::NAN;
    }

    let mut val_rows: Vec64<usize> = Vec64::with_capacity(n);
    let mut na_rows: Vec64<usize> = Vec64::with_capacity(n);
    let mut start = na_block;
    for g in 0..ngroups {
        let size = sizes[g + 1] as usize;
        val_rows.clear();
        na_rows.clear();
        for &row in indexer[start..start + size].iter() {
            let row = row as usize;
            if cell_is_na(values[row], is_datetimelike, mask, row) {
                na_rows.push(row);
            } else {
                val_rows.push(row);
            }
        }
        start += size;

        // stable sort keeps ascending row order inside tie runs
        if ascending {
            val_rows.sort_by(|&a, &b| {
                values[a]
                    .partial_cmp(&values[b])
                    .unwrap_or(Ordering::Equal)
            });
        } else {
            val_rows.sort_by(|&a, &b| {
                values[b]
                    .partial_cmp(&values[a])
                    .unwrap_or(Ordering::Equal)
            });
        }

        // (row, is_missing) in final rank order
        let ordered: Vec<(usize, bool)> = match na_option {
            NaOption::Keep => {
                for &row in na_rows.iter() {
                    out[row] = f64::NAN;
                }
                val_rows.iter().map(|&r| (r, false)).collect()
            }
            NaOption::Top => na_rows
                .iter()
                .map(|&r| (r, true))
                .chain(val_rows.iter().map(|&r| (r, false)))
                .collect(),
            NaOption::Bottom => val_rows
                .iter()
                .map(|&r| (r, false))
                .chain(na_rows.iter().map(|&r| (r, true)))
                .collect(),
        };

        if ordered.is_empty() {
            continue;
        }

        let mut dense_rank = 0.0f64;
        let mut run_start = 0usize;
        while run_start < ordered.len() {
            let mut run_end = run_start + 1;
            while run_end < ordered.len() && ties(&ordered[run_start], &ordered[run_end], values) {
                run_end += 1;
            }
            dense_rank += 1.0;
            for (k, &(row, _)) in ordered[run_start..run_end].iter().enumerate() {
                out[row] = match ties_method {
                    TiesMethod::Average => (run_start + 1 + run_end) as f64 * 0.5,
                    TiesMethod::Min => (run_start + 1) as f64,
                    TiesMethod::Max => run_end as f64,
                    TiesMethod::First => (run_start + k + 1) as f64,
                    TiesMethod::Dense => dense_rank,
                };
            }
            run_start = run_end;
        }

        if pct {
            let divisor = match ties_method {
                TiesMethod::Dense => dense_rank,
                _ => ordered.len() as f64,
            };
            for &(row, _) in &ordered {
                out[row] /= divisor;
            }
        }
    }
    Ok(())
}

#[inline(always)]
fn ties<T: PartialOrd>(a: &(usize, bool), b: &(usize, bool), values: &[T]) -> bool {
    match (a.1, b.1) {
        (true, true) => true,
        (false, false) => values[a.0] == values[b.0],
        _ => false,
    }
}

/// Ranks every column of the value matrix within each group, copying the
/// per-column results into the row-major output.
pub fn group_rank<T>(
    out: &mut [f64],
    values: &[T],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    is_datetimelike: bool,
    ties_method: TiesMethod,
    ascending: bool,
    pct: bool,
    na_option: NaOption,
    mask: Option<&Bitmask>,
) -> Result<(), KernelError>
where
    T: GroupValue + PartialOrd,
{
    let fname = "group_rank";
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    check_len(fname, out.len(), values.len())?;
    check_mask(fname, mask, values.len())?;

    let mut col_values: Vec64<T> = Vec64::with_capacity(nrows);
    let mut col_out = Vec64::with_capacity(nrows);
    for j in 0..ncols {
        col_values.clear();
        col_out.clear();
        col_out.resize(nrows, 0.0f64);
        for i in 0..nrows {
            col_values.push(values[i * ncols + j]);
        }
        let col_mask = mask.map(|m| {
            let mut cm = Bitmask::new_set_all(nrows, true);
            for i in 0..nrows {
                cm.set(i, unsafe { m.get_unchecked(i * ncols + j) });
            }
            cm
        });
        rank_1d(
            &mut col_out,
            &col_values,
            labels,
            ngroups,
            is_datetimelike,
            ties_method,
            ascending,
            pct,
            na_option,
            col_mask.as_ref(),
        )?;
        for i in 0..nrows {
            out[i * ncols + j] = col_out[i];
        }
    }
    Ok(())
}
