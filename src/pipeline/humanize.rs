use rand::Rng;

/// Produce the "humanized" rendition of `input`.
///
/// The input is split on sentence-terminating periods; every fragment
/// with more than five space-separated tokens gets one interior token
/// pair swapped at an index drawn from the supplied randomness source.
/// Shorter fragments pass through byte-identical. Fragments are rejoined
/// with `". "`.
///
/// The randomness source is a parameter so callers decide between a real
/// RNG and a seeded one; the function itself is deterministic for a given
/// input and source. It never fails, whatever the input.
pub fn humanize<R: Rng + ?Sized>(input: &str, rng: &mut R) -> String {
    input
        .split('.')
        .map(|fragment| rework_fragment(fragment, rng))
        .collect::<Vec<_>>()
        .join(". ")
}

fn rework_fragment<R: Rng + ?Sized>(fragment: &str, rng: &mut R) -> String {
    let mut words: Vec<&str> = fragment.trim().split(' ').collect();
    if words.len() <= 5 {
        return fragment.to_string();
    }
    // Interior position only: the first and final tokens never move.
    let i = rng.gen_range(1..=words.len() - 3);
    words.swap(i, i + 1);
    words.join(" ")
}
