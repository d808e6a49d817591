//! 组合引擎
//!
//! 按声明顺序组装异构的键值对、内联块、可选与二选一分支，
//! 并把它们的拼接暴露为一个惰性展平的字节序列。
//!
//! 展平使用 N 路链式迭代器：一个指向子节点的游标加上当前子节点的
//! 活动迭代器；当前子节点耗尽后前进到下一个。除递归深度外只占用
//! 常数辅助状态，总开销与输出长度成正比。
//!
//! 流式输出本身不会失败：长度在 `encoded_len` 中一次性校验，
//! 编码器只在校验通过后才开始拉取字节。

use crate::pair::Pair;
use crate::scalar;
use crate::spec::{TypeTag, BINARY_HEADER_SIZE, LENGTH_PREFIX_SIZE};
use crate::value::Value;
use crate::{BisonError, BisonResult};
use std::{array, iter, option, slice};

/// 组合节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// 单个键值对（值可以是标量，也可以是嵌套文档/数组）
    Pair(Pair),
    /// 原样拼接的一组节点，不额外加帧
    Group(Vec<Node>),
    /// 不输出任何字节
    Absent,
    /// 组合时已选定的二选一分支
    Branch(Branch),
}

/// 二选一分支，只保留被选中的一侧
#[derive(Debug, Clone, PartialEq)]
pub enum Branch {
    Left(Box<Node>),
    Right(Box<Node>),
}

impl Branch {
    /// 根据条件在两个分支中选一个
    pub fn choose(take_left: bool, left: impl Into<Node>, right: impl Into<Node>) -> Self {
        if take_left {
            Branch::Left(Box::new(left.into()))
        } else {
            Branch::Right(Box::new(right.into()))
        }
    }

    pub fn is_left(&self) -> bool {
        matches!(self, Branch::Left(_))
    }

    /// 被选中的节点
    pub fn node(&self) -> &Node {
        match self {
            Branch::Left(node) | Branch::Right(node) => node,
        }
    }
}

impl Node {
    pub fn pair(key: &str, value: impl Into<Value>) -> BisonResult<Self> {
        Pair::new(key, value).map(Node::Pair)
    }

    /// 可选节点：`None` 时不输出字节
    pub fn optional(node: Option<impl Into<Node>>) -> Self {
        node.map_or(Node::Absent, Into::into)
    }

    /// 二选一节点
    pub fn either(take_left: bool, left: impl Into<Node>, right: impl Into<Node>) -> Self {
        Node::Branch(Branch::choose(take_left, left, right))
    }

    pub fn group(nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Group(nodes.into_iter().collect())
    }

    /// 该节点贡献的字节数，同时校验所有长度前缀
    pub fn encoded_len(&self) -> BisonResult<usize> {
        match self {
            Node::Pair(pair) => pair.encoded_len(),
            Node::Group(nodes) => nodes.iter().try_fold(0usize, |acc, node| {
                let len = node.encoded_len()?;
                acc.checked_add(len).ok_or(BisonError::ValueTooLarge(usize::MAX))
            }),
            Node::Absent => Ok(0),
            Node::Branch(branch) => branch.node().encoded_len(),
        }
    }

    pub(crate) fn wire_len(&self) -> usize {
        match self {
            Node::Pair(pair) => pair.wire_len(),
            Node::Group(nodes) => nodes.iter().map(Node::wire_len).sum(),
            Node::Absent => 0,
            Node::Branch(branch) => branch.node().wire_len(),
        }
    }

    /// 惰性字节序列
    pub fn bytes(&self) -> NodeBytes<'_> {
        match self {
            Node::Pair(pair) => pair.bytes(),
            Node::Group(nodes) => NodeBytes::Group(Box::new(Chain::new(nodes))),
            Node::Absent => NodeBytes::Empty,
            Node::Branch(branch) => branch.node().bytes(),
        }
    }
}

impl From<Pair> for Node {
    fn from(pair: Pair) -> Self {
        Node::Pair(pair)
    }
}

impl From<Branch> for Node {
    fn from(branch: Branch) -> Self {
        Node::Branch(branch)
    }
}

impl From<Vec<Node>> for Node {
    fn from(nodes: Vec<Node>) -> Self {
        Node::Group(nodes)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(node: Option<T>) -> Self {
        Node::optional(node)
    }
}

/// N 路链式迭代器
///
/// 依次产出每个子节点的字节。
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    rest: slice::Iter<'a, Node>,
    current: Option<NodeBytes<'a>>,
}

impl<'a> Chain<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        Self {
            rest: nodes.iter(),
            current: None,
        }
    }
}

impl Iterator for Chain<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(byte) = current.next() {
                    return Some(byte);
                }
            }
            self.current = Some(self.rest.next()?.bytes());
        }
    }
}

/// 单个节点的字节序列
#[derive(Debug, Clone)]
pub enum NodeBytes<'a> {
    Element(ElementBytes<'a>),
    Group(Box<Chain<'a>>),
    Empty,
}

impl<'a> NodeBytes<'a> {
    pub(crate) fn pair(key: &'a [u8], value: &'a Value) -> Self {
        match value.tag() {
            Some(tag) => NodeBytes::Element(ElementBytes::new(
                tag,
                KeyBytes::Name(key.iter().copied()),
                value.bytes(),
            )),
            None => NodeBytes::Empty,
        }
    }
}

impl Iterator for NodeBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match self {
            NodeBytes::Element(element) => element.next(),
            NodeBytes::Group(chain) => chain.next(),
            NodeBytes::Empty => None,
        }
    }
}

type ElementInner<'a> =
    iter::Chain<iter::Chain<iter::Chain<iter::Once<u8>, KeyBytes<'a>>, iter::Once<u8>>, ValueBytes<'a>>;

/// 一个元素的字节：`tag ++ key ++ 0x00 ++ value`
#[derive(Debug, Clone)]
pub struct ElementBytes<'a> {
    inner: ElementInner<'a>,
}

impl<'a> ElementBytes<'a> {
    pub(crate) fn new(tag: TypeTag, key: KeyBytes<'a>, value: ValueBytes<'a>) -> Self {
        Self {
            inner: iter::once(tag as u8)
                .chain(key)
                .chain(iter::once(0))
                .chain(value),
        }
    }
}

impl Iterator for ElementBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        self.inner.next()
    }
}

/// 元素键的字节：调用方给出的名字，或数组下标的十进制表示
#[derive(Debug, Clone)]
pub enum KeyBytes<'a> {
    Name(iter::Copied<slice::Iter<'a, u8>>),
    Index(IndexKey),
}

impl Iterator for KeyBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match self {
            KeyBytes::Name(bytes) => bytes.next(),
            KeyBytes::Index(index) => index.next(),
        }
    }
}

/// 数组下标键，在栈上格式化为十进制
#[derive(Debug, Clone)]
pub struct IndexKey {
    digits: [u8; 20],
    pos: usize,
}

impl IndexKey {
    pub fn new(mut index: usize) -> Self {
        let mut digits = [0u8; 20];
        let mut pos = digits.len();
        loop {
            pos -= 1;
            digits[pos] = b'0' + (index % 10) as u8;
            index /= 10;
            if index == 0 {
                break;
            }
        }
        Self { digits, pos }
    }
}

impl Iterator for IndexKey {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = *self.digits.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }
}

/// 十进制下标的字节数
pub(crate) fn index_key_len(mut index: usize) -> usize {
    let mut len = 1;
    while index >= 10 {
        index /= 10;
        len += 1;
    }
    len
}

type Prefixed<'a> = iter::Chain<
    iter::Chain<iter::Take<array::IntoIter<u8, 5>>, iter::Copied<slice::Iter<'a, u8>>>,
    option::IntoIter<u8>,
>;

type Framed<I> = iter::Chain<iter::Chain<array::IntoIter<u8, 4>, I>, iter::Once<u8>>;

/// 值部分的字节
#[derive(Debug, Clone)]
pub enum ValueBytes<'a> {
    /// 定长标量
    Fixed(iter::Take<array::IntoIter<u8, 8>>),
    /// 字符串或二进制：长度前缀(+子类型)、负载、可选结束符
    Prefixed(Prefixed<'a>),
    /// 嵌套文档
    Document(Box<Framed<Chain<'a>>>),
    /// 嵌套数组
    Array(Box<Framed<ArrayChain<'a>>>),
    Empty,
}

impl ValueBytes<'_> {
    fn fixed(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        ValueBytes::Fixed(buf.into_iter().take(bytes.len()))
    }
}

impl<'a> ValueBytes<'a> {
    fn prefixed(prefix: usize, subtype: Option<u8>, body: &'a [u8], terminator: Option<u8>) -> Self {
        let [a, b, c, d] = (prefix as i32).to_le_bytes();
        let head_len = if subtype.is_some() { BINARY_HEADER_SIZE } else { LENGTH_PREFIX_SIZE };
        let head = [a, b, c, d, subtype.unwrap_or(0)];
        ValueBytes::Prefixed(
            head.into_iter()
                .take(head_len)
                .chain(body.iter().copied())
                .chain(terminator),
        )
    }
}

fn framed<I: Iterator<Item = u8>>(len: usize, body: I) -> Framed<I> {
    (len as i32).to_le_bytes().into_iter().chain(body).chain(iter::once(0))
}

impl Iterator for ValueBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match self {
            ValueBytes::Fixed(bytes) => bytes.next(),
            ValueBytes::Prefixed(bytes) => bytes.next(),
            ValueBytes::Document(bytes) => bytes.next(),
            ValueBytes::Array(bytes) => bytes.next(),
            ValueBytes::Empty => None,
        }
    }
}

impl Value {
    /// 值部分的惰性字节序列
    ///
    /// 嵌套文档的长度前缀按算术预先计算，子节点不会先物化再拷贝。
    pub fn bytes(&self) -> ValueBytes<'_> {
        match self {
            Value::Double(v) => ValueBytes::fixed(&scalar::encode_f64(*v)),
            Value::Int32(v) => ValueBytes::fixed(&scalar::encode_i32(*v)),
            Value::Uint64(v) => ValueBytes::fixed(&scalar::encode_u64(*v)),
            Value::Int64(v) => ValueBytes::fixed(&scalar::encode_i64(*v)),
            Value::Boolean(v) => ValueBytes::fixed(&scalar::encode_bool(*v)),
            Value::Null | Value::Absent => ValueBytes::Empty,
            Value::String(s) => ValueBytes::prefixed(s.len() + 1, None, s.as_bytes(), Some(0)),
            Value::Binary(b) => ValueBytes::prefixed(b.bytes.len(), Some(b.subtype.0), &b.bytes, None),
            Value::Document(doc) => {
                ValueBytes::Document(Box::new(framed(doc.wire_len(), doc.body_bytes())))
            }
            Value::Array(arr) => {
                ValueBytes::Array(Box::new(framed(arr.wire_len(), arr.body_bytes())))
            }
        }
    }

    /// 编码值部分（不含类型与键）
    pub fn to_bytes(&self) -> BisonResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len()?);
        out.extend(self.bytes());
        Ok(out)
    }
}

/// 数组元素的链式迭代器
///
/// 跳过 `Absent` 项，只为实际输出的项分配连续下标。
#[derive(Debug, Clone)]
pub struct ArrayChain<'a> {
    items: slice::Iter<'a, Value>,
    index: usize,
    current: Option<ElementBytes<'a>>,
}

impl<'a> ArrayChain<'a> {
    pub fn new(items: &'a [Value]) -> Self {
        Self {
            items: items.iter(),
            index: 0,
            current: None,
        }
    }
}

impl Iterator for ArrayChain<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(byte) = current.next() {
                    return Some(byte);
                }
            }
            let item = self.items.next()?;
            let Some(tag) = item.tag() else {
                continue;
            };
            self.current = Some(ElementBytes::new(
                tag,
                KeyBytes::Index(IndexKey::new(self.index)),
                item.bytes(),
            ));
            self.index += 1;
        }
    }
}

/// 遍历节点树中实际输出的键值对（展开分组与分支，跳过缺省）
#[derive(Debug, Clone)]
pub struct Pairs<'a> {
    stack: Vec<slice::Iter<'a, Node>>,
}

impl<'a> Pairs<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        Self {
            stack: vec![nodes.iter()],
        }
    }
}

impl<'a> Iterator for Pairs<'a> {
    type Item = &'a Pair;

    fn next(&mut self) -> Option<&'a Pair> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                None => {
                    self.stack.pop();
                }
                Some(Node::Pair(pair)) if !pair.value().is_absent() => return Some(pair),
                Some(Node::Pair(_)) | Some(Node::Absent) => {}
                Some(Node::Group(nodes)) => self.stack.push(nodes.iter()),
                Some(Node::Branch(branch)) => {
                    self.stack.push(slice::from_ref(branch.node()).iter())
                }
            }
        }
    }
}
