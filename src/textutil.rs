//! String and array exercises from the course homework, kept as pure
//! functions. Character counts are in `char`s, not bytes, and a "line" is a
//! maximal run of characters without `'\n'`.

use regex::Regex;
use std::collections::HashSet;

/// `text` preceded and followed by `n` `'*'`s.
pub fn emphasize(text: &str, n: usize) -> String {
    let stars = "*".repeat(n);
    format!("{}{}{}", stars, text, stars)
}

/// `s` with the `n` characters starting at index `len/2` removed.
pub fn rm_mid(s: &str, n: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mid = chars.len() / 2;
    chars[..mid]
        .iter()
        .chain(chars[(mid + n).min(chars.len())..].iter())
        .collect()
}

/// Count of distinct characters in `text`.
pub fn distinct_chars(text: &str) -> usize {
    text.chars().collect::<HashSet<_>>().len()
}

/// All words in `text` whose length is divisible by `n`.
pub fn words_with_len_multiple(text: &str, n: usize) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() % n == 0)
        .map(|w| w.to_string())
        .collect()
}

/// `text` with every digit run replaced by the length of that run.
pub fn replace_digit_runs_with_lengths(text: &str) -> String {
    // The pattern is a literal; construction cannot fail.
    let re = Regex::new(r"\d+").expect("valid digit-run pattern");
    re.replace_all(text, |caps: &regex::Captures<'_>| caps[0].len().to_string())
        .into_owned()
}

/// Number of permutations of `arr`; elements are always regarded as distinct.
pub fn n_permutations<T>(arr: &[T]) -> u128 {
    (1..=arr.len() as u128).product()
}

/// Sum of multiplying `x` by each coefficient.
pub fn sum_products(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().map(|c| c * x).sum()
}

/// `[n-1, n-2, ..., 1, 0]`.
pub fn reversed_range(n: usize) -> Vec<usize> {
    (0..n).rev().collect()
}

/// `[init, init+inc, ..., init+(n-1)*inc]`.
pub fn range_step(n: usize, init: i64, inc: i64) -> Vec<i64> {
    (0..n as i64).map(|i| init + i * inc).collect()
}

/// The line containing character index `offset`, or empty when the offset is
/// out of range or lands on a newline.
pub fn line_at(text: &str, offset: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    match chars.get(offset) {
        None | Some('\n') => String::new(),
        Some(_) => {
            let start = chars[..offset]
                .iter()
                .rposition(|&c| c == '\n')
                .map(|i| i + 1)
                .unwrap_or(0);
            let end = chars[offset..]
                .iter()
                .position(|&c| c == '\n')
                .map(|i| offset + i)
                .unwrap_or(chars.len());
            chars[start..end].iter().collect()
        }
    }
}

/// Every line of `text` padded or truncated to exactly `len` characters; each
/// output line ends with `'\n'` whether or not the input line did.
pub fn fixed_length_lines(text: &str, len: usize) -> String {
    text.lines()
        .map(|line| {
            let mut fixed: String = line.chars().take(len).collect();
            let short = len.saturating_sub(fixed.chars().count());
            fixed.extend(std::iter::repeat(' ').take(short));
            fixed.push('\n');
            fixed
        })
        .collect()
}

/// `text` with all even-length lines removed; every retained line ends with
/// `'\n'`.
pub fn odd_length_lines(text: &str) -> String {
    text.lines()
        .filter(|line| line.chars().count() % 2 == 1)
        .map(|line| format!("{}\n", line))
        .collect()
}

/// Prefix sums of `nums`, in linear time.
pub fn sum_partials(nums: &[f64]) -> Vec<f64> {
    let mut sum = 0.0;
    nums.iter()
        .map(|v| {
            sum += v;
            sum
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasize_wraps_with_stars() {
        assert_eq!(emphasize("hello", 2), "**hello**");
        assert_eq!(emphasize("hello", 0), "hello");
        assert_eq!(emphasize("", 3), "******");
    }

    #[test]
    fn rm_mid_removes_from_middle() {
        assert_eq!(rm_mid("abcdef", 2), "abcef");
        assert_eq!(rm_mid("abcde", 1), "abde");
        assert_eq!(rm_mid("ab", 0), "ab");
        // Removal past the end just truncates.
        assert_eq!(rm_mid("abcd", 10), "ab");
    }

    #[test]
    fn distinct_chars_counts_unique() {
        assert_eq!(distinct_chars("abab"), 2);
        assert_eq!(distinct_chars(""), 0);
        assert_eq!(distinct_chars("mississippi"), 4);
    }

    #[test]
    fn words_filtered_by_length_multiple() {
        assert_eq!(
            words_with_len_multiple("a bb ccc dddd", 2),
            vec!["bb".to_string(), "dddd".to_string()]
        );
        assert_eq!(
            words_with_len_multiple("one  two   three", 3),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[test]
    fn digit_runs_become_lengths() {
        assert_eq!(replace_digit_runs_with_lengths("a12b345"), "a2b3");
        assert_eq!(replace_digit_runs_with_lengths("no digits"), "no digits");
        assert_eq!(replace_digit_runs_with_lengths("007"), "3");
    }

    #[test]
    fn permutation_counts_are_factorials() {
        assert_eq!(n_permutations::<i32>(&[]), 1);
        assert_eq!(n_permutations(&[1, 2, 3]), 6);
        assert_eq!(n_permutations(&["a"; 5]), 120);
    }

    #[test]
    fn sum_products_distributes() {
        assert_eq!(sum_products(&[1.0, 2.0, 3.0], 2.0), 12.0);
        assert_eq!(sum_products(&[], 9.0), 0.0);
    }

    #[test]
    fn ranges_count_as_specified() {
        assert_eq!(reversed_range(4), vec![3, 2, 1, 0]);
        assert!(reversed_range(0).is_empty());
        assert_eq!(range_step(4, 10, -2), vec![10, 8, 6, 4]);
        assert_eq!(range_step(3, 0, 1), vec![0, 1, 2]);
    }

    #[test]
    fn line_at_finds_containing_line() {
        let text = "first\nsecond\nthird";
        assert_eq!(line_at(text, 0), "first");
        assert_eq!(line_at(text, 8), "second");
        assert_eq!(line_at(text, 14), "third");
        // A newline offset yields the empty string, as does out-of-range.
        assert_eq!(line_at(text, 5), "");
        assert_eq!(line_at(text, 999), "");
    }

    #[test]
    fn fixed_length_lines_pad_and_truncate() {
        assert_eq!(fixed_length_lines("ab\nlongline", 4), "ab  \nlong\n");
        assert_eq!(fixed_length_lines("exact", 5), "exact\n");
        // Trailing newline does not manufacture an extra line.
        assert_eq!(fixed_length_lines("ab\n", 3), "ab \n");
    }

    #[test]
    fn odd_length_lines_drop_even() {
        assert_eq!(odd_length_lines("a\nbb\nccc\n"), "a\nccc\n");
        assert_eq!(odd_length_lines("even\nfour"), "");
    }

    #[test]
    fn sum_partials_is_running_sum() {
        assert_eq!(sum_partials(&[1.0, 2.0, 3.0]), vec![1.0, 3.0, 6.0]);
        assert!(sum_partials(&[]).is_empty());
    }
}
