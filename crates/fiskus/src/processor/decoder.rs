use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

/// One `<Rueckgabe>` block: the return code and human-readable text the
/// authority attaches to a response section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnSection {
    pub code: String,
    pub message: String,
}

/// Fields extracted from the authority's response envelope.
///
/// The transfer ticket correlates later retrievals with this submission. The
/// transport section reports header-level problems; the business section
/// ("Nutzdaten") reports problems inside the filing itself and is absent
/// when the response never got past the transport header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodedResponse {
    pub transfer_ticket: Option<String>,
    pub transport: Option<ReturnSection>,
    pub business: Option<ReturnSection>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed authority response: {0}")]
    Xml(#[from] quick_xml::Error),
}

fn in_scope(stack: &[String], section: &str) -> bool {
    stack.iter().any(|name| name == section)
}

fn under_rueckgabe(stack: &[String]) -> bool {
    stack.len() >= 2 && stack[stack.len() - 2] == "Rueckgabe"
}

/// Parse the server XML envelope. Element text outside the sections we care
/// about is ignored; a response without a `Nutzdatenblock` yields an
/// explicitly absent business section.
pub fn decode_response(xml: &[u8]) -> Result<DecodedResponse, DecodeError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    let mut transfer_ticket = None;
    let mut transport_code = None;
    let mut transport_message = None;
    let mut business_code = None;
    let mut business_message = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                stack.push(name);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                let value = text.unescape()?.into_owned();
                match stack.last().map(String::as_str) {
                    Some("TransferTicket") if in_scope(&stack, "TransferHeader") => {
                        transfer_ticket = Some(value);
                    }
                    Some("Code") if under_rueckgabe(&stack) => {
                        if in_scope(&stack, "NutzdatenHeader") {
                            business_code = Some(value);
                        } else if in_scope(&stack, "TransferHeader") {
                            transport_code = Some(value);
                        }
                    }
                    Some("Text") if under_rueckgabe(&stack) => {
                        if in_scope(&stack, "NutzdatenHeader") {
                            business_message = Some(value);
                        } else if in_scope(&stack, "TransferHeader") {
                            transport_message = Some(value);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(DecodedResponse {
        transfer_ticket,
        transport: transport_code.map(|code| ReturnSection {
            code,
            message: transport_message.unwrap_or_default(),
        }),
        business: business_code.map(|code| ReturnSection {
            code,
            message: business_message.unwrap_or_default(),
        }),
    })
}
