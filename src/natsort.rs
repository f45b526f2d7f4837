//! Natural ("human") ordering: digit runs compare numerically, so
//! `scan2` sorts before `scan10`.

use std::cmp::Ordering;

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ord = cmp_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        it.next();
    }
    run
}

/// Compare two digit strings by value without overflowing on long runs.
fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len()
        .cmp(&tb.len())
        .then_with(|| ta.cmp(tb))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Sort in place by a natural ordering of the string produced by `key`.
pub fn natural_sort_by_key<T, F>(items: &mut [T], mut key: F)
where
    F: FnMut(&T) -> String,
{
    items.sort_by(|a, b| natural_cmp(&key(a), &key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_runs_sort_numerically() {
        let mut names = vec!["scan10", "scan2", "scan1", "Scan3"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["Scan3", "scan1", "scan2", "scan10"]);
    }

    #[test]
    fn prefixes_sort_first() {
        assert_eq!(natural_cmp("run", "run1"), Ordering::Less);
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Greater);
        assert_eq!(natural_cmp("x12y3", "x12y3"), Ordering::Equal);
    }

    #[test]
    fn very_long_numbers_do_not_overflow() {
        let a = "id99999999999999999999999";
        let b = "id100000000000000000000000";
        assert_eq!(natural_cmp(a, b), Ordering::Less);
    }
}
