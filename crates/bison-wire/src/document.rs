//! 文档与数组结构模块
//!
//! `Document` 是有序节点列表，`Array` 是按位置自动编号的值列表。
//! 两者都只是组合期的描述，编码后得到不可变的字节缓冲区。

use crate::codec::{self, Body};
use crate::compose::{index_key_len, ArrayChain, Branch, Chain, Node, Pairs};
use crate::pair::Pair;
use crate::scalar::length_prefix;
use crate::spec::{TypeTag, MIN_DOCUMENT_SIZE};
use crate::value::Value;
use crate::{BisonError, BisonResult};
use compact_str::CompactString;
use std::fmt;
use std::sync::OnceLock;

/// 已校验的完整编码长度
///
/// 由 `encoded_len` 写入，流式输出时读取；任何修改都会清空。
/// 不参与相等比较。
#[derive(Debug, Clone, Default)]
struct LenCache(OnceLock<usize>);

impl LenCache {
    fn get(&self) -> Option<usize> {
        self.0.get().copied()
    }

    fn set(&self, len: usize) {
        let _ = self.0.set(len);
    }

    fn get_or_init(&self, f: impl FnOnce() -> usize) -> usize {
        *self.0.get_or_init(f)
    }

    fn clear(&mut self) {
        self.0.take();
    }
}

impl PartialEq for LenCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// 文档
///
/// 按声明顺序保存节点，顺序具有语义：重复键在解码时取第一个。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    nodes: Vec<Node>,
    cached_len: LenCache,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            cached_len: LenCache::default(),
        }
    }

    /// 追加任意组合节点
    pub fn push(&mut self, node: impl Into<Node>) -> &mut Self {
        self.cached_len.clear();
        self.nodes.push(node.into());
        self
    }

    /// 追加键值对
    ///
    /// # Brief
    /// 总是追加，不替换同名键
    ///
    /// # Returns
    /// 键无效时返回 `InvalidKey`
    pub fn insert(
        &mut self,
        key: impl Into<CompactString>,
        value: impl Into<Value>,
    ) -> BisonResult<&mut Self> {
        let pair = Pair::new(key, value)?;
        Ok(self.push(pair))
    }

    /// 追加可选键值对，`None` 时不输出任何字节
    pub fn insert_optional<V: Into<Value>>(
        &mut self,
        key: impl Into<CompactString>,
        value: Option<V>,
    ) -> BisonResult<&mut Self> {
        let pair = match value {
            Some(value) => Pair::new(key, value)?,
            None => Pair::new(key, Value::Absent)?,
        };
        Ok(self.push(pair))
    }

    /// 追加二选一节点
    pub fn push_either(
        &mut self,
        take_left: bool,
        left: impl Into<Node>,
        right: impl Into<Node>,
    ) -> &mut Self {
        self.push(Branch::choose(take_left, left, right))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// 实际输出的键值对
    pub fn iter(&self) -> Pairs<'_> {
        Pairs::new(&self.nodes)
    }

    /// 按键查找第一个匹配的值
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.iter().find(|pair| pair.key() == key).map(Pair::value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 实际输出的键值对数量
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// 完整编码长度（含长度前缀与结束符）
    ///
    /// # Returns
    /// 任一长度超出 32 位范围时返回 `ValueTooLarge`
    pub fn encoded_len(&self) -> BisonResult<usize> {
        if let Some(total) = self.cached_len.get() {
            return Ok(total);
        }
        let mut body = 0usize;
        for node in &self.nodes {
            body = body
                .checked_add(node.encoded_len()?)
                .ok_or(BisonError::ValueTooLarge(usize::MAX))?;
        }
        let total = body.saturating_add(MIN_DOCUMENT_SIZE);
        length_prefix(total)?;
        self.cached_len.set(total);
        Ok(total)
    }

    pub(crate) fn wire_len(&self) -> usize {
        self.cached_len.get_or_init(|| {
            self.nodes.iter().map(Node::wire_len).sum::<usize>() + MIN_DOCUMENT_SIZE
        })
    }

    /// 嵌套文档/数组的最大层数，不含嵌套时为 0
    pub fn nesting_depth(&self) -> usize {
        self.iter()
            .map(|pair| pair.value().nesting_depth())
            .max()
            .unwrap_or(0)
    }

    /// 文档体的惰性字节序列（不含长度前缀与结束符）
    pub fn body_bytes(&self) -> Chain<'_> {
        Chain::new(&self.nodes)
    }

    /// 编码为字节向量
    pub fn to_vec(&self) -> BisonResult<Vec<u8>> {
        codec::encode_to_vec(self)
    }
}

impl Body for Document {
    const TAG: TypeTag = TypeTag::Document;
    type Bytes<'a> = Chain<'a>;

    fn encoded_len(&self) -> BisonResult<usize> {
        Document::encoded_len(self)
    }

    fn nesting_depth(&self) -> usize {
        Document::nesting_depth(self)
    }

    fn body_bytes(&self) -> Chain<'_> {
        Document::body_bytes(self)
    }
}

impl FromIterator<Pair> for Document {
    fn from_iter<I: IntoIterator<Item = Pair>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(Node::Pair).collect(),
            cached_len: LenCache::default(),
        }
    }
}

impl FromIterator<Node> for Document {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
            cached_len: LenCache::default(),
        }
    }
}

impl Extend<Node> for Document {
    fn extend<I: IntoIterator<Item = Node>>(&mut self, iter: I) {
        self.cached_len.clear();
        self.nodes.extend(iter);
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, pair) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", pair.key(), pair.value())?;
        }
        write!(f, "}}")
    }
}

/// 数组
///
/// 键由位置自动生成（"0","1",...），调用方不能指定。
/// `Absent` 项被跳过，下标只分配给实际输出的项。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    items: Vec<Value>,
    cached_len: LenCache,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            cached_len: LenCache::default(),
        }
    }

    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        self.cached_len.clear();
        self.items.push(value.into());
        self
    }

    /// 追加可选项，`None` 时不输出
    pub fn push_optional<V: Into<Value>>(&mut self, value: Option<V>) -> &mut Self {
        self.push(value.map_or(Value::Absent, Into::into))
    }

    /// 追加二选一项
    pub fn push_either(
        &mut self,
        take_left: bool,
        left: impl Into<Value>,
        right: impl Into<Value>,
    ) -> &mut Self {
        if take_left {
            self.push(left)
        } else {
            self.push(right)
        }
    }

    /// 实际输出的项
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().filter(|v| !v.is_absent())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.iter().nth(index)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// 完整编码长度（含长度前缀与结束符）
    pub fn encoded_len(&self) -> BisonResult<usize> {
        if let Some(total) = self.cached_len.get() {
            return Ok(total);
        }
        let mut body = 0usize;
        for (index, item) in self.iter().enumerate() {
            let element = 1 + index_key_len(index) + 1 + item.encoded_len()?;
            body = body
                .checked_add(element)
                .ok_or(BisonError::ValueTooLarge(usize::MAX))?;
        }
        let total = body.saturating_add(MIN_DOCUMENT_SIZE);
        length_prefix(total)?;
        self.cached_len.set(total);
        Ok(total)
    }

    pub(crate) fn wire_len(&self) -> usize {
        self.cached_len.get_or_init(|| {
            self.iter()
                .enumerate()
                .map(|(index, item)| 1 + index_key_len(index) + 1 + item.wire_len())
                .sum::<usize>()
                + MIN_DOCUMENT_SIZE
        })
    }

    /// 嵌套文档/数组的最大层数
    pub fn nesting_depth(&self) -> usize {
        self.iter().map(Value::nesting_depth).max().unwrap_or(0)
    }

    pub fn body_bytes(&self) -> ArrayChain<'_> {
        ArrayChain::new(&self.items)
    }

    pub fn to_vec(&self) -> BisonResult<Vec<u8>> {
        codec::encode_to_vec(self)
    }
}

impl Body for Array {
    const TAG: TypeTag = TypeTag::Array;
    type Bytes<'a> = ArrayChain<'a>;

    fn encoded_len(&self) -> BisonResult<usize> {
        Array::encoded_len(self)
    }

    fn nesting_depth(&self) -> usize {
        Array::nesting_depth(self)
    }

    fn body_bytes(&self) -> ArrayChain<'_> {
        Array::body_bytes(self)
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self {
            items,
            cached_len: LenCache::default(),
        }
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
            cached_len: LenCache::default(),
        }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

/// 构造 Document 的便捷宏
///
/// 键必须是非空且不含 NUL 的字面量；否则宏会 panic。
/// 运行期得到的键请使用 `try_doc!` 或 `Document::insert`。
///
/// # 示例
///
/// ```rust,ignore
/// use bison_wire::{array, doc};
///
/// let empty = doc!();
/// let doc = doc! {
///     "name" => "test",
///     "tags" => array!["a", "b"],
///     "inner" => doc! { "n" => 1 },
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        {
            let mut doc = $crate::Document::new();
            $(
                match $crate::Pair::new($key, $value) {
                    Ok(pair) => {
                        doc.push(pair);
                    }
                    Err(e) => panic!("doc!: {}", e),
                }
            )+
            doc
        }
    };
}

/// 可失败版本的 `doc!`
///
/// 遇到第一个无效键即停止，返回 `BisonResult<Document>`。
///
/// ```rust,ignore
/// let key = String::from("name");
/// let doc = try_doc! { key => "test", "n" => 1 }?;
/// ```
#[macro_export]
macro_rules! try_doc {
    () => {
        $crate::BisonResult::Ok($crate::Document::new())
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        {
            let mut doc = $crate::Document::new();
            let mut result: $crate::BisonResult<()> = Ok(());
            $(
                if result.is_ok() {
                    result = doc.insert($key, $value).map(|_| ());
                }
            )+
            result.map(|()| doc)
        }
    };
}

/// 构造 Array 的便捷宏
#[macro_export]
macro_rules! array {
    () => {
        $crate::Array::new()
    };
    ($($value:expr),+ $(,)?) => {
        {
            let mut arr = $crate::Array::new();
            $(
                arr.push($value);
            )+
            arr
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{array, doc, try_doc};

    #[test]
    fn test_insert_keeps_duplicates_in_order() {
        let mut doc = Document::new();
        doc.insert("k", 1i32).unwrap().insert("k", 2i32).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("k"), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_optional_and_either() {
        let mut doc = Document::new();
        doc.insert_optional("missing", None::<i32>).unwrap();
        doc.insert_optional("present", Some("yes")).unwrap();
        doc.push_either(
            false,
            Pair::new("left", 1i32).unwrap(),
            Pair::new("right", 2i32).unwrap(),
        );

        let keys: Vec<&str> = doc.iter().map(Pair::key).collect();
        assert_eq!(keys, ["present", "right"]);
        assert!(!doc.contains_key("missing"));
        assert!(!doc.contains_key("left"));

        let expected = doc! { "present" => "yes", "right" => 2i32 };
        assert_eq!(doc.to_vec().unwrap(), expected.to_vec().unwrap());
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.encoded_len().unwrap(), 5);
        assert_eq!(doc.to_vec().unwrap(), [5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_array_keys_are_positions() {
        let arr = array![10i32, "x"];
        assert_eq!(
            arr.to_vec().unwrap(),
            [
                0x15, 0, 0, 0,
                0x10, b'0', 0, 10, 0, 0, 0,
                0x02, b'1', 0, 2, 0, 0, 0, b'x', 0,
                0,
            ]
        );
    }

    #[test]
    fn test_array_optional_and_either() {
        let mut arr = Array::new();
        arr.push_optional(None::<i32>)
            .push_optional(Some(1i32))
            .push_either(true, "l", "r");
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.get(0), Some(&Value::Int32(1)));
        assert_eq!(arr.get(1), Some(&Value::from("l")));
        assert_eq!(arr.to_vec().unwrap(), array![1i32, "l"].to_vec().unwrap());
    }

    #[test]
    fn test_array_many_items_encoded_len() {
        let arr: Array = (0..150i32).collect();
        let bytes = arr.to_vec().unwrap();
        assert_eq!(arr.encoded_len().unwrap(), bytes.len());
        assert_eq!(arr.wire_len(), bytes.len());
    }

    #[test]
    fn test_nested_macros() {
        let doc = doc! {
            "name" => "test",
            "tags" => array!["a", "b"],
            "inner" => doc! { "n" => 1i32 },
        };
        assert_eq!(doc.len(), 3);
        assert_eq!(
            doc.get("inner").and_then(Value::as_document).and_then(|d| d.get("n")),
            Some(&Value::Int32(1))
        );
        assert_eq!(doc.encoded_len().unwrap(), doc.to_vec().unwrap().len());
    }

    #[test]
    fn test_display() {
        let doc = doc! { "a" => 1i32, "b" => array![true, Value::Null] };
        assert_eq!(doc.to_string(), r#"{"a": 1, "b": [true, null]}"#);
    }

    #[test]
    fn test_try_doc_reports_invalid_key() {
        let key = String::from("name");
        let doc = try_doc! { key.as_str() => "x", "n" => 1i32 }.unwrap();
        assert_eq!(doc, doc! { "name" => "x", "n" => 1i32 });
        assert_eq!(try_doc! {}.unwrap(), Document::new());

        let err = try_doc! { "ok" => 1i32, "bad\0key" => 2i32, "" => 3i32 }.unwrap_err();
        assert_eq!(err, BisonError::InvalidKey("bad\0key".to_string()));
    }

    #[test]
    fn test_nested_lengths_cached_by_encoded_len() {
        let doc = doc! { "outer" => doc! { "list" => array![1i32, "x"] } };
        let Some(Value::Document(outer)) = doc.get("outer") else {
            panic!("outer missing");
        };
        let Some(Value::Array(list)) = outer.get("list") else {
            panic!("list missing");
        };
        assert_eq!(list.cached_len.get(), None);

        assert_eq!(doc.encoded_len().unwrap(), 44);
        assert_eq!(doc.cached_len.get(), Some(44));
        assert_eq!(outer.cached_len.get(), Some(32));
        assert_eq!(list.cached_len.get(), Some(21));
        assert_eq!(doc.to_vec().unwrap().len(), 44);
    }

    #[test]
    fn test_mutation_clears_cached_length() {
        let mut doc = doc! { "a" => 1i32 };
        let untouched = doc.clone();
        assert_eq!(doc.encoded_len().unwrap(), 12);
        assert_eq!(doc, untouched);

        doc.insert("b", "xy").unwrap();
        assert_eq!(doc.cached_len.get(), None);
        let bytes = doc.to_vec().unwrap();
        assert_eq!(bytes.len(), 22);
        assert_eq!(bytes[0], 22);

        let mut arr = array![true];
        assert_eq!(arr.encoded_len().unwrap(), 9);
        arr.push_optional(None::<i32>).push(false);
        assert_eq!(arr.encoded_len().unwrap(), 13);
        assert_eq!(arr.to_vec().unwrap().len(), 13);
    }

    #[test]
    #[should_panic(expected = "doc!")]
    fn test_macro_rejects_empty_key() {
        let _ = doc! { "" => 1i32 };
    }
}
