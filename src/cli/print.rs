use imapbox::EmailObject;

fn addresses(addresses: &[imapbox::message::Address]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn summary(email: &EmailObject) {
    println!(
        "{}\t{}\t{}\t{}",
        email.meta().uid(),
        email.date().as_deref().unwrap_or("-"),
        addresses(email.from()),
        email.subject().as_deref().unwrap_or("(no subject)"),
    );
}

pub fn email(email: &EmailObject) {
    println!("UID: {}", email.meta().uid());
    println!("Flags: {}", email.meta().flags().join(" "));
    if email.meta().is_partial() {
        println!("(flags unavailable)");
    }
    for (name, value) in email.headers() {
        println!("{name}: {value}");
    }
    println!();
    if let Some(plain) = email.plain().first() {
        println!("{plain}");
    } else if !email.html().is_empty() {
        println!("({} HTML part(s) only)", email.html().len());
    }
    for attachment in email.attachments() {
        println!(
            "[attachment {} {} {} bytes]",
            attachment.filename().as_deref().unwrap_or("unnamed"),
            attachment.content_type(),
            attachment.size()
        );
    }
}
