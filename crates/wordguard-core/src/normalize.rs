//! Text normalization for matching.
//!
//! All rules scan normalized text rather than raw input: traditional Chinese
//! is mapped to simplified, case is folded, and whitespace runs collapse to a
//! single space. The separate [`clean_for_matching`] pass additionally strips
//! a fixed class of noise characters used to defeat word-splitting evasion
//! (e.g. `p*o*r*n`). Reported positions are offsets into the text a rule
//! actually scanned, so the noise-stripping pass is never applied to text
//! whose original offsets must survive untranslated.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Compact traditional → simplified mapping covering the high-frequency
/// characters seen in wordlists. Not a full OpenCC table; unknown characters
/// pass through unchanged.
const T2S_PAIRS: &[(char, char)] = &[
    ('國', '国'),
    ('說', '说'),
    ('話', '话'),
    ('時', '时'),
    ('東', '东'),
    ('樂', '乐'),
    ('愛', '爱'),
    ('為', '为'),
    ('爲', '为'),
    ('會', '会'),
    ('學', '学'),
    ('書', '书'),
    ('體', '体'),
    ('號', '号'),
    ('長', '长'),
    ('風', '风'),
    ('電', '电'),
    ('買', '买'),
    ('賣', '卖'),
    ('車', '车'),
    ('馬', '马'),
    ('鳥', '鸟'),
    ('魚', '鱼'),
    ('門', '门'),
    ('開', '开'),
    ('關', '关'),
    ('問', '问'),
    ('間', '间'),
    ('聞', '闻'),
    ('連', '连'),
    ('運', '运'),
    ('過', '过'),
    ('還', '还'),
    ('這', '这'),
    ('邊', '边'),
    ('進', '进'),
    ('遠', '远'),
    ('選', '选'),
    ('錢', '钱'),
    ('銀', '银'),
    ('鐵', '铁'),
    ('頭', '头'),
    ('頁', '页'),
    ('顏', '颜'),
    ('題', '题'),
    ('類', '类'),
    ('飛', '飞'),
    ('飯', '饭'),
    ('館', '馆'),
    ('點', '点'),
    ('黨', '党'),
    ('歲', '岁'),
    ('兒', '儿'),
    ('幾', '几'),
    ('廣', '广'),
    ('畫', '画'),
    ('當', '当'),
    ('發', '发'),
    ('讀', '读'),
    ('變', '变'),
    ('讓', '让'),
    ('語', '语'),
    ('誰', '谁'),
    ('請', '请'),
    ('謝', '谢'),
    ('貝', '贝'),
    ('財', '财'),
    ('質', '质'),
    ('業', '业'),
    ('義', '义'),
    ('習', '习'),
    ('聽', '听'),
    ('覺', '觉'),
    ('觀', '观'),
    ('計', '计'),
    ('記', '记'),
    ('設', '设'),
    ('許', '许'),
    ('詞', '词'),
    ('試', '试'),
    ('認', '认'),
    ('輪', '轮'),
    ('網', '网'),
    ('絡', '络'),
    ('線', '线'),
    ('維', '维'),
    ('經', '经'),
    ('統', '统'),
    ('總', '总'),
    ('聯', '联'),
    ('臺', '台'),
    ('灣', '湾'),
    ('萬', '万'),
    ('與', '与'),
    ('產', '产'),
    ('權', '权'),
    ('機', '机'),
    ('殺', '杀'),
    ('毀', '毁'),
    ('藥', '药'),
    ('槍', '枪'),
    ('彈', '弹'),
    ('滅', '灭'),
    ('亂', '乱'),
];

fn t2s_table() -> &'static HashMap<char, char> {
    static TABLE: OnceLock<HashMap<char, char>> = OnceLock::new();
    TABLE.get_or_init(|| T2S_PAIRS.iter().copied().collect())
}

/// Returns true for characters in the CJK Unified Ideographs block.
pub(crate) fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Returns true for characters stripped by [`clean_for_matching`].
fn is_noise(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | '*'
                | '_'
                | '-'
                | '+'
                | '|'
                | '\\'
                | '/'
                | '['
                | ']'
                | '{'
                | '}'
                | '('
                | ')'
                | '（'
                | '）'
                | '【'
                | '】'
                | '《'
                | '》'
                | '“'
                | '”'
                | '‘'
                | '’'
        )
}

/// Canonicalizes text for matching: traditional → simplified mapping, case
/// folding, and whitespace collapsing.
///
/// Idempotent: `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(text: &str) -> String {
    let table = t2s_table();
    let unified: String = text
        .chars()
        .map(|c| table.get(&c).copied().unwrap_or(c))
        .collect();
    let folded = unified.to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips the fixed noise-character class used to defeat word-splitting
/// evasion. Matching-only: offsets into the result do not line up with the
/// input.
pub fn clean_for_matching(text: &str) -> String {
    text.chars().filter(|c| !is_noise(*c)).collect()
}

/// Sentence-terminal characters preferred as split points.
fn is_sentence_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '\n')
}

/// Splits text exceeding `max_len` codepoints into chunks, preferring the
/// nearest preceding sentence terminal within the trailing half of each
/// chunk and falling back to a hard cut.
///
/// Never fails; short text comes back as a single chunk.
pub fn split(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if max_len == 0 || chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_len).min(chars.len());

        // Scan backward no further than half the chunk for a sentence end.
        if end < chars.len() {
            let floor = start + max_len / 2;
            for i in (floor..end).rev() {
                if is_sentence_terminal(chars[i]) {
                    end = i + 1;
                    break;
                }
            }
        }

        chunks.push(chars[start..end].iter().collect());
        start = end;
    }

    chunks
}
