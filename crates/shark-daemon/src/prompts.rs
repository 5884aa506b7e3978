use protocol::Prompt;

const PROMPTS: [(&str, &str); 3] = [
    (
        "wireshark_filters",
        "Common display filters:\n\
         - IP address: ip.addr == 192.168.1.1\n\
         - Port: tcp.port == 80 or udp.port == 53\n\
         - Protocol: http or dns or tcp\n\
         - HTTP requests: http.request.method == \"GET\"\n\
         - DNS names: dns.qry.name contains \"example.com\"\n\
         - Packet size: frame.len > 1000\n\
         - Combined: (ip.src == 192.168.1.1) && (tcp.port == 80)\n\
         \n\
         Examples:\n\
         1. Traffic of one host: ip.addr == 10.0.0.1\n\
         2. DNS queries only: dns && dns.flags.response == 0\n\
         3. TCP retransmissions: tcp.analysis.retransmission\n\
         4. HTTP errors: http.response.code >= 400\n",
    ),
    (
        "wireshark_analysis",
        "Basic analysis workflow:\n\
         1. Narrow the scope with a display filter\n\
         2. Locate key connections (SYN, SYN-ACK handshakes)\n\
         3. Inspect response times and latency\n\
         4. Look for errors and retransmissions\n\
         5. Drill into protocol-specific fields\n\
         6. Export relevant conversations to separate files\n\
         \n\
         Useful analysis types: conversations, endpoints, protocols, http, dns.\n\
         Slow responses: tcp.time_delta > 1\n",
    ),
    (
        "wireshark_commands",
        "Useful tshark command lines:\n\
         - Capture: tshark -i <interface> -w <output.pcap>\n\
         - Read a capture: tshark -r <input.pcap>\n\
         - Apply a display filter: tshark -r <input.pcap> -Y \"<display filter>\"\n\
         - Extract fields: tshark -r <input.pcap> -T fields -e <field>\n\
         - Statistics: tshark -r <input.pcap> -q -z <statistics>\n",
    ),
];

pub(crate) fn list_prompts() -> Vec<Prompt> {
    PROMPTS
        .iter()
        .map(|(id, text)| Prompt {
            id: id.to_string(),
            text: text.to_string(),
        })
        .collect()
}

pub(crate) fn get_prompt(id: &str) -> Option<Prompt> {
    list_prompts().into_iter().find(|prompt| prompt.id == id)
}
