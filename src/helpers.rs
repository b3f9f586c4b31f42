use crate::core_network::connection::Connection;
use log::trace;

/// Sends a reply line to the client, terminated with CRLF.
pub fn send_response(writer: &mut dyn Connection, message: &str) {
    trace!("Reply: {}", message);
    let mut line = String::with_capacity(message.len() + 2);
    line.push_str(message);
    line.push_str("\r\n");
    writer.write(line.as_bytes());
}

/// Extracts the first space-delimited word of an argument string.
pub fn first_word(arg: &str) -> &str {
    arg.split(' ').find(|word| !word.is_empty()).unwrap_or("")
}
