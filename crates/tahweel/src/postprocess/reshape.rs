//! Arabic presentation-form reshaping.
//!
//! Converters frequently emit Arabic text as bare base letters (U+0621..),
//! which renders disconnected in consumers that do not run a shaping engine.
//! This module rewrites a logical-order string into Unicode Presentation
//! Forms-B (U+FE70..U+FEFF): each letter is replaced by its isolated, final,
//! initial or medial glyph depending on whether its neighbours join to it,
//! and the mandatory lam-alef ligatures are applied.
//!
//! Harakat and other combining marks are transparent for joining purposes
//! and are carried through unchanged.

/// Contextual glyph forms of one Arabic letter.
///
/// `final_` absent means the letter never joins (hamza); `initial` absent
/// means it joins only to the right (alef, dal, reh, waw, ...).
struct Forms {
    isolated: char,
    final_: Option<char>,
    initial: Option<char>,
    medial: Option<char>,
}

const LAM: char = '\u{0644}';

fn forms(c: char) -> Option<Forms> {
    let f = |isolated, final_, initial, medial| Some(Forms {
        isolated,
        final_,
        initial,
        medial,
    });

    match c {
        '\u{0621}' => f('\u{FE80}', None, None, None),
        '\u{0622}' => f('\u{FE81}', Some('\u{FE82}'), None, None),
        '\u{0623}' => f('\u{FE83}', Some('\u{FE84}'), None, None),
        '\u{0624}' => f('\u{FE85}', Some('\u{FE86}'), None, None),
        '\u{0625}' => f('\u{FE87}', Some('\u{FE88}'), None, None),
        '\u{0626}' => f('\u{FE89}', Some('\u{FE8A}'), Some('\u{FE8B}'), Some('\u{FE8C}')),
        '\u{0627}' => f('\u{FE8D}', Some('\u{FE8E}'), None, None),
        '\u{0628}' => f('\u{FE8F}', Some('\u{FE90}'), Some('\u{FE91}'), Some('\u{FE92}')),
        '\u{0629}' => f('\u{FE93}', Some('\u{FE94}'), None, None),
        '\u{062A}' => f('\u{FE95}', Some('\u{FE96}'), Some('\u{FE97}'), Some('\u{FE98}')),
        '\u{062B}' => f('\u{FE99}', Some('\u{FE9A}'), Some('\u{FE9B}'), Some('\u{FE9C}')),
        '\u{062C}' => f('\u{FE9D}', Some('\u{FE9E}'), Some('\u{FE9F}'), Some('\u{FEA0}')),
        '\u{062D}' => f('\u{FEA1}', Some('\u{FEA2}'), Some('\u{FEA3}'), Some('\u{FEA4}')),
        '\u{062E}' => f('\u{FEA5}', Some('\u{FEA6}'), Some('\u{FEA7}'), Some('\u{FEA8}')),
        '\u{062F}' => f('\u{FEA9}', Some('\u{FEAA}'), None, None),
        '\u{0630}' => f('\u{FEAB}', Some('\u{FEAC}'), None, None),
        '\u{0631}' => f('\u{FEAD}', Some('\u{FEAE}'), None, None),
        '\u{0632}' => f('\u{FEAF}', Some('\u{FEB0}'), None, None),
        '\u{0633}' => f('\u{FEB1}', Some('\u{FEB2}'), Some('\u{FEB3}'), Some('\u{FEB4}')),
        '\u{0634}' => f('\u{FEB5}', Some('\u{FEB6}'), Some('\u{FEB7}'), Some('\u{FEB8}')),
        '\u{0635}' => f('\u{FEB9}', Some('\u{FEBA}'), Some('\u{FEBB}'), Some('\u{FEBC}')),
        '\u{0636}' => f('\u{FEBD}', Some('\u{FEBE}'), Some('\u{FEBF}'), Some('\u{FEC0}')),
        '\u{0637}' => f('\u{FEC1}', Some('\u{FEC2}'), Some('\u{FEC3}'), Some('\u{FEC4}')),
        '\u{0638}' => f('\u{FEC5}', Some('\u{FEC6}'), Some('\u{FEC7}'), Some('\u{FEC8}')),
        '\u{0639}' => f('\u{FEC9}', Some('\u{FECA}'), Some('\u{FECB}'), Some('\u{FECC}')),
        '\u{063A}' => f('\u{FECD}', Some('\u{FECE}'), Some('\u{FECF}'), Some('\u{FED0}')),
        '\u{0640}' => f('\u{0640}', Some('\u{0640}'), Some('\u{0640}'), Some('\u{0640}')),
        '\u{0641}' => f('\u{FED1}', Some('\u{FED2}'), Some('\u{FED3}'), Some('\u{FED4}')),
        '\u{0642}' => f('\u{FED5}', Some('\u{FED6}'), Some('\u{FED7}'), Some('\u{FED8}')),
        '\u{0643}' => f('\u{FED9}', Some('\u{FEDA}'), Some('\u{FEDB}'), Some('\u{FEDC}')),
        '\u{0644}' => f('\u{FEDD}', Some('\u{FEDE}'), Some('\u{FEDF}'), Some('\u{FEE0}')),
        '\u{0645}' => f('\u{FEE1}', Some('\u{FEE2}'), Some('\u{FEE3}'), Some('\u{FEE4}')),
        '\u{0646}' => f('\u{FEE5}', Some('\u{FEE6}'), Some('\u{FEE7}'), Some('\u{FEE8}')),
        '\u{0647}' => f('\u{FEE9}', Some('\u{FEEA}'), Some('\u{FEEB}'), Some('\u{FEEC}')),
        '\u{0648}' => f('\u{FEED}', Some('\u{FEEE}'), None, None),
        '\u{0649}' => f('\u{FEEF}', Some('\u{FEF0}'), None, None),
        '\u{064A}' => f('\u{FEF1}', Some('\u{FEF2}'), Some('\u{FEF3}'), Some('\u{FEF4}')),
        _ => None,
    }
}

/// Isolated and final forms of a lam-alef ligature, if `alef` forms one.
fn lam_alef(alef: char) -> Option<(char, char)> {
    match alef {
        '\u{0622}' => Some(('\u{FEF5}', '\u{FEF6}')),
        '\u{0623}' => Some(('\u{FEF7}', '\u{FEF8}')),
        '\u{0625}' => Some(('\u{FEF9}', '\u{FEFA}')),
        '\u{0627}' => Some(('\u{FEFB}', '\u{FEFC}')),
        _ => None,
    }
}

/// Combining marks that are invisible to the joining algorithm.
fn is_transparent(c: char) -> bool {
    matches!(c, '\u{0610}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}')
}

/// True if the text contains any character the shaper would rewrite.
pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(|c| forms(c).is_some())
}

/// Index of the next non-transparent character at or after `start`.
fn next_base(chars: &[char], start: usize) -> Option<usize> {
    (start..chars.len()).find(|&i| !is_transparent(chars[i]))
}

/// Reshape a logical-order string into presentation forms.
///
/// Characters outside the Arabic block pass through unchanged, so mixed
/// left-to-right/right-to-left runs are safe to feed in whole.
pub fn reshape_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    // Whether the previously written base glyph connects forward.
    let mut prev_joins = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if is_transparent(c) {
            out.push(c);
            i += 1;
            continue;
        }

        let Some(f) = forms(c) else {
            out.push(c);
            prev_joins = false;
            i += 1;
            continue;
        };

        if c == LAM {
            if let Some(j) = next_base(&chars, i + 1) {
                if let Some((isolated, final_)) = lam_alef(chars[j]) {
                    out.push(if prev_joins { final_ } else { isolated });
                    // Marks between lam and alef ride along after the ligature.
                    for &mark in &chars[i + 1..j] {
                        out.push(mark);
                    }
                    prev_joins = false;
                    i = j + 1;
                    continue;
                }
            }
        }

        let connects_prev = prev_joins && f.final_.is_some();
        let connects_next = f.initial.is_some()
            && next_base(&chars, i + 1)
                .and_then(|j| forms(chars[j]))
                .map(|next| next.final_.is_some())
                .unwrap_or(false);

        let shaped = match (connects_prev, connects_next) {
            (false, false) => f.isolated,
            (true, false) => f.final_.unwrap_or(f.isolated),
            (false, true) => f.initial.unwrap_or(f.isolated),
            (true, true) => f.medial.unwrap_or(f.isolated),
        };

        out.push(shaped);
        prev_joins = connects_next;
        i += 1;
    }

    out
}
