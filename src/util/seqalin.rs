//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! File     : seqalin.rs  
//! Author   : Chase Ruskin  
//! Topic    : Dynamic Programming
//! Abstract :
//!     Given two strings `s1` and `s2`, find a min-cost alignment. Costs are
//!     supplied to _gaps_ and _mismatches_. The alignment cost drives the
//!     "did you mean" suggestions for mistyped device parts.

type Cost = usize;

/// Given two strings `s1` of length _n_ and `s2` of length _m_, find a min-cost
/// alignment. Costs are defined as gap penalties and mismatch penalties.
///
/// __time complexity__: O(nm)   
/// __space complexity__: O(m)
///
/// Note: Case sensitivity is not applied within the function.
fn sequence_alignment(s1: &str, s2: &str, gap_penalty: Cost, mismatch_penalty: Cost) -> Cost {
    let s2: Vec<char> = s2.chars().collect();
    // only the previous row of the table is needed to fill in the next one
    let mut prev: Vec<Cost> = (0..=s2.len()).map(|j| j * gap_penalty).collect();
    let mut next: Vec<Cost> = vec![0; s2.len() + 1];
    for (i, c1) in s1.chars().enumerate() {
        next[0] = (i + 1) * gap_penalty;
        for (j, c2) in s2.iter().enumerate() {
            next[j + 1] = (mismatch_penalty * ((c1 != *c2) as Cost) + prev[j])
                .min(gap_penalty + prev[j + 1])
                .min(gap_penalty + next[j]);
        }
        std::mem::swap(&mut prev, &mut next);
    }
    prev[s2.len()]
}

/// Computes how alike `s1` and `s2` are on a scale from 0.0 to 1.0.
///
/// A mismatch costs the same as two gaps, so the alignment cost is the number of
/// insertions and deletions needed to turn one word into the other.
pub fn similarity(s1: &str, s2: &str) -> f32 {
    let total = s1.chars().count() + s2.chars().count();
    if total == 0 {
        return 1.0;
    }
    1.0 - sequence_alignment(s1, s2, 1, 2) as f32 / total as f32
}

/// Given a word `s` and a known set of words `bank`, determine which word is the
/// most similar to `s` while scoring at least `cutoff`.
///
/// Ties resolve to the earliest word in `bank`.
pub fn sel_closest_str<'a, T: AsRef<str>>(s: &str, bank: &'a [T], cutoff: f32) -> Option<&'a str> {
    let (w, score) = bank
        .iter()
        .map(|f| (f, similarity(s, f.as_ref())))
        .fold(None, |best: Option<(&T, f32)>, (w, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((w, score)),
        })?;
    if score >= cutoff {
        Some(w.as_ref())
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn it_works() {
        assert_eq!(sequence_alignment("identity", "similarity", 2, 1), 8);
        assert_eq!(sequence_alignment("palate", "palette", 2, 1), 3);
        assert_eq!(sequence_alignment("ctaccg", "tacatg", 2, 1), 5);
        assert_eq!(sequence_alignment("stop", "tops", 2, 1), 4);
        assert_eq!(sequence_alignment("ocurrance", "occurrence", 2, 1), 3);
        assert_eq!(sequence_alignment("go gators", "go gators", 2, 1), 0);
        assert_eq!(sequence_alignment("", "alpha", 2, 1), 10);
        assert_eq!(sequence_alignment("", "", 2, 1), 0);
        // case sensitivity is not applied inside the fn
        assert_eq!(sequence_alignment("ALPHA", "alpha", 2, 1), 5);
    }

    #[test]
    fn similarity_scores() {
        assert_eq!(similarity("xc7a35t", "xc7a35t"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        // 8 extra characters over 22 total
        assert!((similarity("xc7a35t", "xc7a35tcsg324-1") - 14.0 / 22.0).abs() < 1e-6);
    }

    #[test]
    fn get_closest_word() {
        let bank: Vec<&str> = vec![];
        assert_eq!(sel_closest_str("word", &bank, 0.6), None);

        let bank: Vec<&str> = vec!["xc7a35tcsg324-1", "xc7a100tcsg324-1", "5cefa2f23c8"];
        assert_eq!(
            sel_closest_str("xc7a35t", &bank, 0.6),
            Some("xc7a35tcsg324-1")
        );
        assert_eq!(
            sel_closest_str("xc7a35tcsg324-2", &bank, 0.6),
            Some("xc7a35tcsg324-1")
        );
        assert_eq!(sel_closest_str("ep4ce22f17c6", &bank, 0.6), None);
    }

    #[test]
    fn ties_keep_bank_order() {
        let bank = vec!["abx", "aby"];
        assert_eq!(sel_closest_str("abz", &bank, 0.5), Some("abx"));
    }
}
