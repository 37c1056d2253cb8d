/// Google Docs batchUpdate 请求构造
///
/// 只负责拼 JSON，不发请求
use serde_json::{json, Value};

/// 插入图片的默认尺寸（PT）
pub const IMAGE_SIZE_PT: f64 = 500.0;

/// 文档四周页边距（PT）
pub const PAGE_MARGIN_PT: f64 = 36.0;

pub fn insert_text(index: i64, text: &str) -> Value {
    json!({
        "insertText": {
            "location": { "index": index },
            "text": text
        }
    })
}

pub fn insert_inline_image(index: i64, uri: &str, size_pt: f64) -> Value {
    json!({
        "insertInlineImage": {
            "location": { "index": index },
            "uri": uri,
            "objectSize": {
                "width": { "magnitude": size_pt, "unit": "PT" },
                "height": { "magnitude": size_pt, "unit": "PT" }
            }
        }
    })
}

pub fn insert_page_break(index: i64) -> Value {
    json!({
        "insertPageBreak": {
            "location": { "index": index }
        }
    })
}

/// 给 [start, end) 范围的文字加超链接
pub fn link_text(start: i64, end: i64, url: &str) -> Value {
    json!({
        "updateTextStyle": {
            "range": { "startIndex": start, "endIndex": end },
            "textStyle": { "link": { "url": url } },
            "fields": "link"
        }
    })
}

/// 新建文档的请求体
pub fn new_document(title: &str) -> Value {
    let margin = json!({ "magnitude": PAGE_MARGIN_PT, "unit": "PT" });
    json!({
        "title": title,
        "documentStyle": {
            "marginTop": margin,
            "marginBottom": margin,
            "marginLeft": margin,
            "marginRight": margin
        }
    })
}

/// 文档正文末尾的插入位置
///
/// 正文为空时返回 1；否则是最后一个结构元素的 endIndex - 1（最后的换行符之前）
pub fn end_index_of(document: &Value) -> i64 {
    document
        .pointer("/body/content")
        .and_then(Value::as_array)
        .and_then(|content| content.last())
        .and_then(|last| last.get("endIndex"))
        .and_then(Value::as_i64)
        .map(|end| (end - 1).max(1))
        .unwrap_or(1)
}

/// 文字在文档索引中占用的长度（按 UTF-16 计）
pub fn text_len(text: &str) -> i64 {
    text.encode_utf16().count() as i64
}
