//! 符号按键提示表（日文 MacBook / US 布局）

use crate::KeyboardLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Shift,
    Option,
    Control,
    Command,
}

/// 某个符号在物理键盘上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMapping {
    pub symbol: char,
    pub key: &'static str,
    pub modifiers: &'static [Modifier],
    pub hint: &'static str,
}

const SHIFT: &[Modifier] = &[Modifier::Shift];
const OPTION: &[Modifier] = &[Modifier::Option];
const NONE: &[Modifier] = &[];

const fn map(
    symbol: char,
    key: &'static str,
    modifiers: &'static [Modifier],
    hint: &'static str,
) -> KeyMapping {
    KeyMapping {
        symbol,
        key,
        modifiers,
        hint,
    }
}

pub const JP_MAC_SYMBOL_MAP: &[KeyMapping] = &[
    // 数字行
    map('!', "1", SHIFT, "Shift + 1"),
    map('"', "2", SHIFT, "Shift + 2"),
    map('#', "3", SHIFT, "Shift + 3"),
    map('$', "4", SHIFT, "Shift + 4"),
    map('%', "5", SHIFT, "Shift + 5"),
    map('&', "6", SHIFT, "Shift + 6"),
    map('\'', "7", SHIFT, "Shift + 7"),
    map('(', "8", SHIFT, "Shift + 8"),
    map(')', "9", SHIFT, "Shift + 9"),
    map('=', "-", SHIFT, "Shift + -"),
    map('~', "^", SHIFT, "Shift + ^"),
    map('|', "¥", SHIFT, "Shift + ¥"),
    map('`', "@", SHIFT, "Shift + @"),
    // 括号
    map('{', "[", SHIFT, "Shift + ["),
    map('}', "]", SHIFT, "Shift + ]"),
    map('[', "[", NONE, "["),
    map(']', "]", NONE, "]"),
    // 标点
    map('+', ";", SHIFT, "Shift + ;"),
    map('*', ":", SHIFT, "Shift + :"),
    map('<', ",", SHIFT, "Shift + ,"),
    map('>', ".", SHIFT, "Shift + ."),
    map('?', "/", SHIFT, "Shift + /"),
    map('_', "\\", SHIFT, "Shift + \\"),
    map('@', "@", NONE, "@"),
    map(':', ":", NONE, ":"),
    map(';', ";", NONE, ";"),
    // 反斜杠在日文键盘上走 ¥ 键
    map('\\', "¥", OPTION, "Option + ¥"),
];

pub const US_SYMBOL_MAP: &[KeyMapping] = &[
    map('!', "1", SHIFT, "Shift + 1"),
    map('@', "2", SHIFT, "Shift + 2"),
    map('#', "3", SHIFT, "Shift + 3"),
    map('$', "4", SHIFT, "Shift + 4"),
    map('%', "5", SHIFT, "Shift + 5"),
    map('^', "6", SHIFT, "Shift + 6"),
    map('&', "7", SHIFT, "Shift + 7"),
    map('*', "8", SHIFT, "Shift + 8"),
    map('(', "9", SHIFT, "Shift + 9"),
    map(')', "0", SHIFT, "Shift + 0"),
    map('_', "-", SHIFT, "Shift + -"),
    map('+', "=", SHIFT, "Shift + ="),
    map('{', "[", SHIFT, "Shift + ["),
    map('}', "]", SHIFT, "Shift + ]"),
    map('|', "\\", SHIFT, "Shift + \\"),
    map(':', ";", SHIFT, "Shift + ;"),
    map('"', "'", SHIFT, "Shift + '"),
    map('<', ",", SHIFT, "Shift + ,"),
    map('>', ".", SHIFT, "Shift + ."),
    map('?', "/", SHIFT, "Shift + /"),
    map('~', "`", SHIFT, "Shift + `"),
];

/// 换行需要单独确认
pub const RETURN_HINT: &str = "Return";

impl KeyboardLayout {
    /// 自定义布局暂时回退到日文 Mac 表
    pub fn symbol_map(&self) -> &'static [KeyMapping] {
        match self {
            Self::JpMac | Self::Custom => JP_MAC_SYMBOL_MAP,
            Self::Us => US_SYMBOL_MAP,
        }
    }

    pub fn mapping(&self, ch: char) -> Option<&'static KeyMapping> {
        self.symbol_map().iter().find(|m| m.symbol == ch)
    }
}

pub fn key_hint(ch: char, layout: KeyboardLayout) -> Option<&'static str> {
    if ch == '\n' {
        return Some(RETURN_HINT);
    }
    layout.mapping(ch).map(|m| m.hint)
}

/// 任一布局中需要特殊处理的符号
pub fn is_special_char(ch: char) -> bool {
    JP_MAC_SYMBOL_MAP
        .iter()
        .chain(US_SYMBOL_MAP)
        .any(|m| m.symbol == ch)
}
