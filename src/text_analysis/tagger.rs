//! Linguistic tagging: sentence segmentation, part-of-speech and a shallow
//! dependency parse.
//!
//! Analyzers depend on the [`LinguisticTagger`] trait only. The bundled
//! [`HeuristicTagger`] is a rule-based English tagger using Penn fine tags
//! (`VBD`, `VBZ`, ...), Universal coarse tags (`PRON`, `DET`, ...) and
//! ClearNLP-style dependency labels (`nsubj`, `auxpass`, ...). Tests can
//! substitute a tagger that returns a hand-built [`TaggedDoc`].

use std::collections::HashSet;

use fancy_regex::Regex as FancyRegex;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// =============================================================================
// Tagged document model
// =============================================================================

/// Universal coarse part-of-speech tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pos {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Space,
    Verb,
    X,
}

impl Pos {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pos::Adj => "ADJ",
            Pos::Adp => "ADP",
            Pos::Adv => "ADV",
            Pos::Aux => "AUX",
            Pos::Cconj => "CCONJ",
            Pos::Det => "DET",
            Pos::Intj => "INTJ",
            Pos::Noun => "NOUN",
            Pos::Num => "NUM",
            Pos::Part => "PART",
            Pos::Pron => "PRON",
            Pos::Propn => "PROPN",
            Pos::Punct => "PUNCT",
            Pos::Sconj => "SCONJ",
            Pos::Space => "SPACE",
            Pos::Verb => "VERB",
            Pos::X => "X",
        }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One token. `head` is an index into the owning sentence; the root points
/// at itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    pub pos: Pos,
    pub tag: &'static str,
    pub dep: &'static str,
    pub head: usize,
}

impl Token {
    pub fn is_punct(&self) -> bool {
        self.pos == Pos::Punct
    }

    pub fn is_space(&self) -> bool {
        self.pos == Pos::Space || self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaggedSentence {
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaggedDoc {
    pub sentences: Vec<TaggedSentence>,
}

impl TaggedDoc {
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.sentences.iter().flat_map(|s| s.tokens.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

/// Source of sentence, POS and dependency annotations.
pub trait LinguisticTagger: Send + Sync {
    fn tag(&self, text: &str) -> TaggedDoc;

    fn name(&self) -> &'static str {
        "tagger"
    }
}

// =============================================================================
// Segmentation
// =============================================================================

static PARAGRAPH_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n+").expect("Invalid paragraph split regex"));

// Split after . ! ? (optionally followed by a closing quote) and whitespace.
static SENTENCE_SPLIT: Lazy<FancyRegex> = Lazy::new(|| {
    FancyRegex::new(r#"(?<=[.!?])\s+|(?<=[.!?]["'”’])\s+"#)
        .expect("Invalid sentence split regex")
});

static WORD_OR_PUNCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['\u{2019}]\p{L}+)*|[^\s\p{L}\p{N}]")
        .expect("Invalid token regex")
});

/// Split text into sentences: paragraphs first, then terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    for paragraph in PARAGRAPH_SPLIT.split(text) {
        let mut last_end = 0;
        for m in SENTENCE_SPLIT.find_iter(paragraph).flatten() {
            push_trimmed(&mut result, &paragraph[last_end..m.start()]);
            last_end = m.end();
        }
        push_trimmed(&mut result, &paragraph[last_end..]);
    }
    result
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

// =============================================================================
// Heuristic tagger
// =============================================================================

/// Rule-based English tagger. Closed-class words come from fixed lists,
/// open-class words from suffixes and the neighbouring tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTagger;

impl LinguisticTagger for HeuristicTagger {
    fn tag(&self, text: &str) -> TaggedDoc {
        let sentences = split_sentences(text)
            .into_iter()
            .map(tag_sentence)
            .filter(|s| !s.tokens.is_empty())
            .collect();
        TaggedDoc { sentences }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn set(words: &[&'static str]) -> HashSet<&'static str> {
    words.iter().copied().collect()
}

static DETERMINERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "the", "a", "an", "this", "that", "these", "those", "every", "each", "some", "any",
        "no", "another", "either", "neither", "all", "both", "such",
    ])
});

static PRONOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "i", "you", "he", "she", "it", "we", "they", "me", "him", "us", "them", "myself",
        "yourself", "himself", "herself", "itself", "ourselves", "themselves", "someone",
        "something", "nothing", "everyone", "everything", "anyone", "anything", "nobody",
        "somebody", "everybody", "who", "whom", "what", "which", "mine", "yours", "hers",
        "ours", "theirs",
    ])
});

static POSSESSIVES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| set(&["my", "your", "his", "its", "our", "their", "her"]));

static SUBJECT_PLURAL: Lazy<HashSet<&'static str>> =
    Lazy::new(|| set(&["i", "you", "we", "they"]));

static PREPOSITIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "of", "in", "on", "at", "by", "for", "with", "from", "to", "into", "onto", "upon",
        "over", "under", "through", "across", "toward", "towards", "behind", "beside",
        "between", "among", "against", "along", "around", "about", "above", "below",
        "beneath", "near", "past", "without", "within", "during", "before", "after",
        "until", "since", "off", "out", "like", "inside", "outside", "beyond", "down", "up",
    ])
});

static COORDINATORS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| set(&["and", "but", "or", "nor", "yet", "so"]));

static SUBORDINATORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "because", "although", "though", "while", "if", "unless", "whereas", "when", "where",
        "as", "than", "whether", "once",
    ])
});

static MODALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "will", "would", "can", "could", "shall", "should", "may", "might", "must", "won't",
        "can't", "cannot", "couldn't", "wouldn't", "shouldn't", "mustn't",
    ])
});

static ADVERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "very", "just", "then", "now", "still", "never", "always", "too", "also", "only",
        "even", "again", "here", "there", "soon", "already", "almost", "quite", "rather",
        "perhaps", "back", "away", "often", "ever", "later", "once", "maybe", "together",
        "instead", "yet", "somewhere", "anywhere", "everywhere", "forward", "outside",
    ])
});

static INTERJECTIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| set(&["oh", "ah", "hey", "wow", "ouch", "yes", "okay", "hmm", "well"]));

static NUMBERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "twenty", "hundred", "thousand", "million",
    ])
});

static ADJECTIVES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "old", "new", "good", "bad", "great", "small", "large", "big", "long", "short",
        "dark", "cold", "warm", "hot", "quiet", "loud", "soft", "hard", "bright", "pale",
        "red", "blue", "green", "black", "white", "grey", "gray", "empty", "full", "heavy",
        "slow", "fast", "strange", "familiar", "young", "tall", "thin", "thick", "deep",
        "sharp", "silent", "wet", "dry", "clean", "dirty", "certain", "sure", "alone",
        "own", "other", "same", "last", "first", "next", "few", "many", "much", "more",
        "most", "less", "little", "whole", "real", "true", "free", "low", "high", "late",
        "early", "friendly", "lonely", "lovely", "ugly", "silly", "holy", "likely",
        "elderly", "deadly", "lively", "still",
    ])
});

static LY_NOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "family", "belly", "jelly", "rally", "reply", "supply", "ally", "bully", "lily",
        "italy", "july", "assembly", "butterfly", "anomaly", "monopoly",
    ])
});

static NON_VERB_ED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "speed", "creed", "breed", "greed", "hundred", "sacred", "wicked", "naked", "rugged",
        "ragged", "jagged", "beloved", "kindred", "hatred", "bleed", "steed", "tweed",
    ])
});

static NON_VERB_ING: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "thing", "things", "nothing", "something", "anything", "everything", "king", "ring",
        "wing", "spring", "string", "ceiling", "morning", "evening", "during", "building",
        "lightning", "nothing", "sibling", "pudding", "darling", "ding", "awning",
    ])
});

static BE_FORMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "am", "is", "are", "was", "were", "be", "been", "being", "isn't", "aren't", "wasn't",
        "weren't",
    ])
});

static HAVE_FORMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&["have", "has", "had", "haven't", "hasn't", "hadn't"])
});

static DO_FORMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&["do", "does", "did", "don't", "doesn't", "didn't"])
});

static IRREGULAR_PAST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "went", "came", "saw", "took", "made", "knew", "thought", "felt", "found", "gave",
        "told", "left", "stood", "sat", "ran", "began", "held", "brought", "kept", "spoke",
        "heard", "fell", "rose", "got", "said", "met", "led", "lay", "sent", "spent",
        "built", "bought", "caught", "taught", "fought", "sought", "won", "wore", "tore",
        "broke", "chose", "drove", "drew", "grew", "threw", "flew", "shook", "woke",
        "wrote", "rode", "struck", "hung", "swung", "slid", "hid", "bit", "lit", "shot",
        "slept", "swept", "wept", "crept", "fed", "fled", "bled", "meant", "paid", "laid",
        "became", "forgot", "understood", "ate", "sang", "rang", "drank", "sank", "swam",
        "froze", "stole", "knelt", "leapt", "dealt", "dug", "stuck", "clung", "sprang",
    ])
});

static IRREGULAR_PARTICIPLE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "gone", "seen", "taken", "given", "known", "done", "written", "broken", "chosen",
        "driven", "drawn", "grown", "thrown", "flown", "shaken", "woken", "ridden", "stolen",
        "frozen", "spoken", "forgotten", "hidden", "bitten", "eaten", "fallen", "risen",
        "beaten", "worn", "torn", "sworn", "begun", "sung", "rung", "drunk", "sunk",
        "shrunk", "been",
    ])
});

static BASE_VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "walk", "run", "look", "go", "come", "see", "take", "make", "know", "think", "feel",
        "find", "give", "tell", "leave", "stand", "sit", "hold", "bring", "keep", "speak",
        "hear", "fall", "rise", "turn", "open", "close", "move", "wait", "try", "want",
        "need", "seem", "watch", "say", "ask", "reach", "pull", "push", "stop", "start",
        "begin", "smile", "nod", "laugh", "cry", "shake", "breathe", "whisper", "follow",
        "step", "stare", "listen", "call", "write", "read", "live", "die", "love", "hate",
        "hope", "fear", "remember", "forget", "believe", "understand", "answer", "carry",
        "touch", "lean", "glance", "press", "grab", "drop", "lift", "climb", "wake",
        "sleep", "eat", "drink", "catch", "throw", "break", "hide", "stay", "return",
        "enter", "cross", "notice", "realize", "wonder", "pause", "shrug", "sigh", "blink",
        "hurry", "kneel", "slip", "point", "pick", "help", "work", "play", "show", "become",
        "get", "put", "let", "set", "cut", "hit", "shut", "burn", "glow", "howl", "echo",
        "drift", "pulse", "hum", "flicker", "shift", "settle", "creak", "rattle", "whistle",
        "knock", "slam", "fill", "spill", "pour", "wash", "clean", "paint", "draw", "sing",
        "dance", "fight", "win", "lose", "buy", "sell", "pay", "send", "build", "learn",
        "teach", "change", "happen", "include", "continue", "mean", "hang", "swing", "strike",
    ])
});

/// Verb stem for an inflected `-s` form, if the stem is a known base verb.
fn third_person_stem(lower: &str) -> Option<String> {
    if let Some(stem) = lower.strip_suffix("ies") {
        let candidate = format!("{stem}y");
        if BASE_VERBS.contains(candidate.as_str()) {
            return Some(candidate);
        }
    }
    if let Some(stem) = lower.strip_suffix("es") {
        if BASE_VERBS.contains(stem) {
            return Some(stem.to_string());
        }
    }
    if let Some(stem) = lower.strip_suffix('s') {
        if BASE_VERBS.contains(stem) {
            return Some(stem.to_string());
        }
    }
    None
}

fn has_letters_or_digits(word: &str) -> bool {
    word.chars().any(|c| c.is_alphanumeric())
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Context-free first guess for a single word.
fn lexical_category(word: &str, lower: &str, sentence_initial: bool) -> (Pos, &'static str) {
    if !has_letters_or_digits(word) {
        let tag = match word {
            "." | "!" | "?" => ".",
            "," => ",",
            ";" | ":" | "-" | "\u{2014}" | "\u{2013}" => ":",
            _ => "''",
        };
        return (Pos::Punct, tag);
    }
    if word.chars().all(|c| c.is_ascii_digit()) || NUMBERS.contains(lower) {
        return (Pos::Num, "CD");
    }
    if lower == "not" || lower == "n't" {
        return (Pos::Part, "RB");
    }
    if lower == "to" {
        return (Pos::Part, "TO");
    }
    if BE_FORMS.contains(lower) {
        let tag = match lower {
            "am" | "are" | "aren't" => "VBP",
            "is" | "isn't" => "VBZ",
            "was" | "were" | "wasn't" | "weren't" => "VBD",
            "been" => "VBN",
            "being" => "VBG",
            _ => "VB",
        };
        return (Pos::Aux, tag);
    }
    if HAVE_FORMS.contains(lower) {
        let tag = match lower {
            "has" | "hasn't" => "VBZ",
            "had" | "hadn't" => "VBD",
            _ => "VBP",
        };
        return (Pos::Verb, tag);
    }
    if DO_FORMS.contains(lower) {
        let tag = match lower {
            "does" | "doesn't" => "VBZ",
            "did" | "didn't" => "VBD",
            _ => "VBP",
        };
        return (Pos::Aux, tag);
    }
    if MODALS.contains(lower) {
        return (Pos::Aux, "MD");
    }
    if POSSESSIVES.contains(lower) {
        return (Pos::Pron, "PRP$");
    }
    if PRONOUNS.contains(lower) {
        return (Pos::Pron, "PRP");
    }
    if DETERMINERS.contains(lower) {
        return (Pos::Det, "DT");
    }
    if COORDINATORS.contains(lower) {
        return (Pos::Cconj, "CC");
    }
    if SUBORDINATORS.contains(lower) {
        return (Pos::Sconj, "IN");
    }
    if PREPOSITIONS.contains(lower) {
        return (Pos::Adp, "IN");
    }
    if INTERJECTIONS.contains(lower) {
        return (Pos::Intj, "UH");
    }
    if ADVERBS.contains(lower) {
        return (Pos::Adv, "RB");
    }
    if IRREGULAR_PAST.contains(lower) {
        return (Pos::Verb, "VBD");
    }
    if IRREGULAR_PARTICIPLE.contains(lower) {
        return (Pos::Verb, "VBN");
    }
    if BASE_VERBS.contains(lower) {
        return (Pos::Verb, "VB");
    }
    if ADJECTIVES.contains(lower) {
        return (Pos::Adj, "JJ");
    }
    if is_capitalized(word) && !sentence_initial {
        return (Pos::Propn, "NNP");
    }
    if third_person_stem(lower).is_some() {
        return (Pos::Verb, "VBZ");
    }
    if lower.len() > 4 && lower.ends_with("ed") && !NON_VERB_ED.contains(lower) {
        return (Pos::Verb, "VBD");
    }
    if lower.len() > 4 && lower.ends_with("ing") && !NON_VERB_ING.contains(lower) {
        return (Pos::Verb, "VBG");
    }
    if lower.len() > 4 && lower.ends_with("ly") {
        if LY_NOUNS.contains(lower) {
            return (Pos::Noun, "NN");
        }
        return (Pos::Adv, "RB");
    }
    const ADJ_SUFFIXES: &[&str] = &["ous", "ful", "less", "ive", "able", "ible", "ic", "ish"];
    if lower.len() > 5 && ADJ_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return (Pos::Adj, "JJ");
    }
    if is_capitalized(word) && sentence_initial {
        return (Pos::Propn, "NNP");
    }
    if lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss") {
        return (Pos::Noun, "NNS");
    }
    (Pos::Noun, "NN")
}

struct Draft {
    text: String,
    lower: String,
    pos: Pos,
    tag: &'static str,
    dep: &'static str,
    head: usize,
}

fn tag_sentence(sentence: &str) -> TaggedSentence {
    let words: Vec<&str> = WORD_OR_PUNCT.find_iter(sentence).map(|m| m.as_str()).collect();
    let first_word = words.iter().position(|w| has_letters_or_digits(w));

    let mut toks: Vec<Draft> = words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let lower = w.to_lowercase();
            let (pos, tag) = lexical_category(w, &lower, Some(i) == first_word);
            Draft {
                text: (*w).to_string(),
                lower,
                pos,
                tag,
                dep: "dep",
                head: i,
            }
        })
        .collect();

    resolve_context(&mut toks);
    let passive_at = mark_passives(&mut toks);
    assign_dependencies(&mut toks, passive_at);

    TaggedSentence {
        tokens: toks
            .into_iter()
            .map(|d| Token {
                text: d.text,
                pos: d.pos,
                tag: d.tag,
                dep: d.dep,
                head: d.head,
            })
            .collect(),
    }
}

fn prev_content(toks: &[Draft], i: usize) -> Option<usize> {
    (0..i).rev().find(|&j| toks[j].pos != Pos::Punct)
}

/// Previous token skipping punctuation, adverbs and negation.
fn prev_governor(toks: &[Draft], i: usize) -> Option<usize> {
    (0..i)
        .rev()
        .find(|&j| !matches!(toks[j].pos, Pos::Punct | Pos::Adv | Pos::Part))
}

fn next_content(toks: &[Draft], i: usize) -> Option<usize> {
    (i + 1..toks.len()).find(|&j| !matches!(toks[j].pos, Pos::Punct | Pos::Adv | Pos::Part))
}

fn is_nominal_modifier(t: &Draft) -> bool {
    matches!(t.pos, Pos::Det | Pos::Adj | Pos::Num) || t.tag == "PRP$"
}

/// Second pass: settle ambiguous open-class guesses from their neighbours.
fn resolve_context(toks: &mut [Draft]) {
    for i in 0..toks.len() {
        let prev = prev_content(toks, i);

        if toks[i].tag == "PRP$" && toks[i].lower == "her" {
            let next_nominal = (i + 1 < toks.len())
                && matches!(toks[i + 1].pos, Pos::Noun | Pos::Adj | Pos::Propn | Pos::Num);
            if !next_nominal {
                toks[i].tag = "PRP";
            }
        }

        if toks[i].tag == "TO" {
            let nominal_next = toks.get(i + 1).is_some_and(|t| {
                matches!(
                    t.pos,
                    Pos::Det | Pos::Pron | Pos::Noun | Pos::Propn | Pos::Num | Pos::Adj
                )
            });
            if nominal_next {
                toks[i].pos = Pos::Adp;
                toks[i].tag = "IN";
            }
        }

        if toks[i].pos != Pos::Verb {
            continue;
        }

        let after_modifier = prev.is_some_and(|p| is_nominal_modifier(&toks[p]));
        if after_modifier && !HAVE_FORMS.contains(toks[i].lower.as_str()) {
            let (pos, tag) = match toks[i].tag {
                "VBD" | "VBN" if toks[i].lower.ends_with("ed") => (Pos::Adj, "JJ"),
                "VBZ" => (Pos::Noun, "NNS"),
                _ => (Pos::Noun, "NN"),
            };
            toks[i].pos = pos;
            toks[i].tag = tag;
            continue;
        }

        let governor = prev_governor(toks, i);
        match toks[i].tag {
            "VB" => {
                let tag = match governor.map(|g| &toks[g]) {
                    Some(g) if g.tag == "MD" || g.tag == "TO" => "VB",
                    Some(g) if DO_FORMS.contains(g.lower.as_str()) => "VB",
                    Some(g) if SUBJECT_PLURAL.contains(g.lower.as_str()) => "VBP",
                    Some(g) if matches!(g.tag, "NNS" | "NN" | "NNP" | "PRP") => "VBP",
                    _ => "VB",
                };
                toks[i].tag = tag;
            }
            "VBD" => {
                let after_aux = governor.is_some_and(|g| {
                    let l = toks[g].lower.as_str();
                    BE_FORMS.contains(l) || HAVE_FORMS.contains(l)
                });
                if after_aux {
                    toks[i].tag = "VBN";
                }
            }
            _ => {}
        }

        // have/has/had followed by a participle is an auxiliary.
        if HAVE_FORMS.contains(toks[i].lower.as_str()) {
            if let Some(n) = next_content(toks, i) {
                if toks[n].pos == Pos::Verb && matches!(toks[n].tag, "VBD" | "VBN") {
                    toks[i].pos = Pos::Aux;
                    toks[n].tag = "VBN";
                }
            }
        }
    }
}

/// Mark be + participle constructions. Returns the participle index of the
/// first passive clause, if any.
fn mark_passives(toks: &mut [Draft]) -> Option<usize> {
    let mut first = None;
    for i in 0..toks.len() {
        if toks[i].tag != "VBN" {
            continue;
        }
        let Some(g) = prev_governor(toks, i) else {
            continue;
        };
        if BE_FORMS.contains(toks[g].lower.as_str()) {
            toks[g].dep = "auxpass";
            toks[g].head = i;
            toks[i].pos = Pos::Verb;
            first.get_or_insert(i);
        }
    }
    first
}

fn nearest_verb(toks: &[Draft], i: usize) -> Option<usize> {
    let back = (0..i).rev().find(|&j| toks[j].pos == Pos::Verb);
    let fwd = (i + 1..toks.len()).find(|&j| toks[j].pos == Pos::Verb);
    match (back, fwd) {
        (Some(b), Some(f)) => Some(if i - b <= f - i { b } else { f }),
        (b, f) => b.or(f),
    }
}

fn assign_dependencies(toks: &mut [Draft], passive_at: Option<usize>) {
    let n = toks.len();
    if n == 0 {
        return;
    }

    let root = (0..n)
        .find(|&i| toks[i].pos == Pos::Verb)
        .or_else(|| (0..n).find(|&i| toks[i].pos == Pos::Aux))
        .or_else(|| (0..n).find(|&i| toks[i].pos != Pos::Punct))
        .unwrap_or(0);

    for i in 0..n {
        if i == root {
            toks[i].dep = "ROOT";
            toks[i].head = i;
            continue;
        }
        if toks[i].dep == "auxpass" {
            continue;
        }

        let (head, dep) = match toks[i].pos {
            Pos::Punct | Pos::Space => (root, "punct"),
            Pos::Det | Pos::Adj | Pos::Num => {
                let dep = match toks[i].pos {
                    Pos::Det => "det",
                    Pos::Num => "nummod",
                    _ => "amod",
                };
                match next_nominal(toks, i) {
                    Some(h) => (h, dep),
                    None => (root, "acomp"),
                }
            }
            Pos::Pron if toks[i].tag == "PRP$" => match next_nominal(toks, i) {
                Some(h) => (h, "poss"),
                None => (root, "dobj"),
            },
            Pos::Aux => match (i + 1..n).find(|&j| toks[j].pos == Pos::Verb) {
                Some(h) => (h, "aux"),
                None => (root, "aux"),
            },
            Pos::Part => match (i + 1..n).find(|&j| toks[j].pos == Pos::Verb) {
                Some(h) if toks[i].tag == "TO" => (h, "aux"),
                Some(h) => (h, "neg"),
                None => (root, "neg"),
            },
            Pos::Adv => (nearest_verb(toks, i).unwrap_or(root), "advmod"),
            Pos::Adp => {
                let h = (0..i)
                    .rev()
                    .find(|&j| matches!(toks[j].pos, Pos::Verb | Pos::Noun | Pos::Propn))
                    .unwrap_or(root);
                (h, "prep")
            }
            Pos::Noun | Pos::Propn | Pos::Pron => {
                if i + 1 < n && matches!(toks[i].pos, Pos::Noun | Pos::Propn) && toks[i + 1].pos == toks[i].pos {
                    (i + 1, "compound")
                } else if let Some(p) = governing_preposition(toks, i) {
                    (p, "pobj")
                } else if i < root {
                    let dep = if passive_at.is_some_and(|v| v > i) {
                        "nsubjpass"
                    } else {
                        "nsubj"
                    };
                    (root, dep)
                } else {
                    let h = (0..i).rev().find(|&j| toks[j].pos == Pos::Verb).unwrap_or(root);
                    (h, "dobj")
                }
            }
            Pos::Cconj => (prev_content(toks, i).unwrap_or(root), "cc"),
            Pos::Sconj => match (i + 1..n).find(|&j| toks[j].pos == Pos::Verb) {
                Some(h) => (h, "mark"),
                None => (root, "mark"),
            },
            Pos::Verb => {
                let coordinated = (root.min(i)..root.max(i)).any(|j| toks[j].pos == Pos::Cconj);
                (root, if coordinated { "conj" } else { "advcl" })
            }
            Pos::Intj => (root, "intj"),
            Pos::X => (root, "dep"),
        };
        toks[i].head = head;
        toks[i].dep = dep;
    }
}

/// Next noun-like token before any verb, preposition or punctuation.
fn next_nominal(toks: &[Draft], i: usize) -> Option<usize> {
    for j in i + 1..toks.len() {
        match toks[j].pos {
            Pos::Noun | Pos::Propn => return Some(j),
            Pos::Pron if toks[j].tag == "PRP" => return Some(j),
            Pos::Det | Pos::Adj | Pos::Num | Pos::Adv => continue,
            Pos::Pron => continue,
            _ => return None,
        }
    }
    None
}

/// The preposition governing a nominal at `i`, if one sits between it and
/// the previous verb.
fn governing_preposition(toks: &[Draft], i: usize) -> Option<usize> {
    for j in (0..i).rev() {
        match toks[j].pos {
            Pos::Adp => return Some(j),
            Pos::Verb | Pos::Aux | Pos::Punct | Pos::Cconj | Pos::Sconj => return None,
            _ => continue,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &str) -> Vec<(String, &'static str)> {
        HeuristicTagger
            .tag(text)
            .tokens()
            .map(|t| (t.text.clone(), t.tag))
            .collect()
    }

    fn tag_of(text: &str, word: &str) -> &'static str {
        tags(text)
            .into_iter()
            .find(|(w, _)| w == word)
            .map(|(_, t)| t)
            .unwrap_or("missing")
    }

    #[test]
    fn splits_on_terminal_punctuation_and_paragraphs() {
        let s = split_sentences("One two. Three four! Five?\n\nSix seven");
        assert_eq!(s, vec!["One two.", "Three four!", "Five?", "Six seven"]);
    }

    #[test]
    fn splits_after_closing_quote() {
        let s = split_sentences("\"Go now.\" She left.");
        assert_eq!(s, vec!["\"Go now.\"", "She left."]);
    }

    #[test]
    fn past_and_present_verbs_get_penn_tags() {
        assert_eq!(tag_of("She walked to the door.", "walked"), "VBD");
        assert_eq!(tag_of("She walks to the door.", "walks"), "VBZ");
        assert_eq!(tag_of("They walk to the door.", "walk"), "VBP");
        assert_eq!(tag_of("He was there.", "was"), "VBD");
        assert_eq!(tag_of("He is there.", "is"), "VBZ");
        assert_eq!(tag_of("She said nothing.", "said"), "VBD");
    }

    #[test]
    fn determiner_forces_nominal_reading() {
        assert_eq!(tag_of("The walks were long.", "walks"), "NNS");
        assert_eq!(tag_of("The tired man slept.", "tired"), "JJ");
    }

    #[test]
    fn passive_clause_is_labelled() {
        let doc = HeuristicTagger.tag("The door was opened by the guard.");
        let deps: Vec<&str> = doc.tokens().map(|t| t.dep).collect();
        assert!(deps.contains(&"auxpass"));
        assert!(deps.contains(&"nsubjpass"));
    }

    #[test]
    fn every_sentence_has_one_root() {
        let doc = HeuristicTagger.tag("The old man walked home. It rained. Silence.");
        for s in &doc.sentences {
            let roots = s.tokens.iter().filter(|t| t.dep == "ROOT").count();
            assert_eq!(roots, 1);
            for t in &s.tokens {
                assert!(t.head < s.tokens.len());
            }
        }
    }

    #[test]
    fn sentence_openers_use_coarse_tags() {
        let doc = HeuristicTagger.tag("She ran. The dog barked. Slowly, it stopped.");
        let openers: Vec<Pos> = doc.sentences.iter().map(|s| s.tokens[0].pos).collect();
        assert_eq!(openers, vec![Pos::Pron, Pos::Det, Pos::Adv]);
    }
}
