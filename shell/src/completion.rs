use std::cmp::Ordering;

use bitflags::bitflags;

bitflags! {
    /// Flags attached to a completion candidate.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct CompleteFlags: u8 {
        /// The candidate replaces the token being completed rather than
        /// extending it.
        const REPLACES_TOKEN = 1 << 0;
        /// A leading tilde in the candidate is literal and must not be
        /// escaped when rendered.
        const DONT_ESCAPE_TILDES = 1 << 1;
    }
}

/// One expansion result. For ordinary argument expansion only `completion`
/// matters; the description and flags are consumed by the completion UI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Completion {
    pub completion: String,
    pub description: Option<String>,
    pub flags: CompleteFlags,
}

impl Completion {
    pub fn new<S: Into<String>>(
        completion: S,
        description: Option<String>,
        flags: CompleteFlags,
    ) -> Self {
        Self {
            completion: completion.into(),
            description,
            flags,
        }
    }

    pub fn from_completion<S: Into<String>>(completion: S) -> Self {
        Self::new(completion, None, CompleteFlags::empty())
    }

    pub fn with_description<S: Into<String>, D: Into<String>>(completion: S, description: D) -> Self {
        Self::new(completion, Some(description.into()), CompleteFlags::empty())
    }

    pub fn replaces_token(&self) -> bool {
        self.flags.contains(CompleteFlags::REPLACES_TOKEN)
    }
}

/// Order strings the way a directory listing should read: case-insensitive,
/// with runs of digits compared by numeric value ("file9" before "file10").
/// Fully tied strings fall back to an ordinary comparison so the ordering
/// stays total.
pub fn natural_compare(a: &str, b: &str) -> Ordering {
    let mut ac = a.chars().peekable();
    let mut bc = b.chars().peekable();

    loop {
        match (ac.peek().copied(), bc.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let xs: String = take_digits(&mut ac);
                let ys: String = take_digits(&mut bc);
                let xt = xs.trim_start_matches('0');
                let yt = ys.trim_start_matches('0');

                let ordering = xt.len().cmp(&yt.len()).then_with(|| xt.cmp(yt));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = fold_case(x).cmp(&fold_case(y));
                if ordering != Ordering::Equal {
                    return ordering;
                }

                ac.next();
                bc.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = it.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        it.next();
    }
    digits
}

fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}
